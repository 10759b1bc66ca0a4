//! Observed unit state.

use std::fmt;

use serde::Serialize;

/// Active state of a unit as reported by `systemctl is-active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Active,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Reloading,
    /// No unit file, or a state string this crate does not know.
    Unknown,
}

impl UnitState {
    /// Parse `systemctl is-active` output.
    pub fn parse(output: &str) -> Self {
        match output.trim() {
            "active" => UnitState::Active,
            "inactive" => UnitState::Inactive,
            "failed" => UnitState::Failed,
            "activating" => UnitState::Activating,
            "deactivating" => UnitState::Deactivating,
            "reloading" => UnitState::Reloading,
            _ => UnitState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Active => "active",
            UnitState::Inactive => "inactive",
            UnitState::Failed => "failed",
            UnitState::Activating => "activating",
            UnitState::Deactivating => "deactivating",
            UnitState::Reloading => "reloading",
            UnitState::Unknown => "unknown",
        }
    }

    /// Whether the unit has a running (or starting) main process.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            UnitState::Active | UnitState::Activating | UnitState::Reloading
        )
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_states() {
        assert_eq!(UnitState::parse("active\n"), UnitState::Active);
        assert_eq!(UnitState::parse("failed"), UnitState::Failed);
        assert_eq!(UnitState::parse("deactivating\n"), UnitState::Deactivating);
    }

    #[test]
    fn test_parse_unexpected_output() {
        assert_eq!(UnitState::parse(""), UnitState::Unknown);
        assert_eq!(UnitState::parse("maintenance"), UnitState::Unknown);
    }

    #[test]
    fn test_running_states() {
        assert!(UnitState::Active.is_running());
        assert!(UnitState::Reloading.is_running());
        assert!(!UnitState::Failed.is_running());
        assert!(!UnitState::Unknown.is_running());
    }
}
