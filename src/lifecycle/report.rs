//! Results returned by lifecycle operations.

use std::path::PathBuf;

use serde::Serialize;

use crate::systemd::UnitState;

use super::state::LifecycleState;

/// What `create` does after saving the definition.
///
/// Enabling or starting implies deploying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub deploy: bool,
    pub enable: bool,
    pub start: bool,
}

impl CreateOptions {
    /// Save, deploy, enable and start.
    pub fn full() -> Self {
        Self {
            deploy: true,
            enable: true,
            start: true,
        }
    }

    pub fn deploys(&self) -> bool {
        self.deploy || self.enable || self.start
    }

    /// State a successful `create` with these options ends in.
    pub fn target_state(&self) -> LifecycleState {
        if self.start {
            LifecycleState::Active
        } else if self.enable {
            LifecycleState::Enabled
        } else if self.deploy {
            LifecycleState::Deployed
        } else {
            LifecycleState::Rendered
        }
    }
}

/// Outcome of a successful `create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateReport {
    pub name: String,
    pub record_path: PathBuf,
    /// Set when the unit was deployed.
    pub unit_path: Option<PathBuf>,
    pub state: LifecycleState,
}

/// Observed status of a service, derived fresh from disk and systemd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub unit_path: PathBuf,
    /// Whether the unit file exists.
    pub deployed: bool,
    /// Whether a definition record exists.
    pub defined: bool,
    pub state: UnitState,
    pub enabled: bool,
    pub main_pid: Option<u32>,
}

impl ServiceStatus {
    /// Lifecycle state implied by what was observed.
    pub fn lifecycle_state(&self) -> LifecycleState {
        if !self.deployed {
            return LifecycleState::Validated;
        }
        match self.state {
            UnitState::Active | UnitState::Activating | UnitState::Reloading => {
                LifecycleState::Active
            }
            UnitState::Failed => LifecycleState::Failed,
            UnitState::Inactive | UnitState::Deactivating if self.enabled => {
                LifecycleState::Enabled
            }
            UnitState::Inactive | UnitState::Deactivating => LifecycleState::Inactive,
            UnitState::Unknown => LifecycleState::Deployed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(deployed: bool, state: UnitState, enabled: bool) -> ServiceStatus {
        ServiceStatus {
            name: "svc1".to_string(),
            unit_path: PathBuf::from("/etc/systemd/system/svc1.service"),
            deployed,
            defined: true,
            state,
            enabled,
            main_pid: None,
        }
    }

    #[test]
    fn test_target_state() {
        assert_eq!(CreateOptions::default().target_state(), LifecycleState::Rendered);
        assert_eq!(CreateOptions::full().target_state(), LifecycleState::Active);
        let enable_only = CreateOptions {
            enable: true,
            ..CreateOptions::default()
        };
        assert!(enable_only.deploys());
        assert_eq!(enable_only.target_state(), LifecycleState::Enabled);
    }

    #[test]
    fn test_lifecycle_state_from_status() {
        assert_eq!(
            status(false, UnitState::Unknown, false).lifecycle_state(),
            LifecycleState::Validated
        );
        assert_eq!(
            status(true, UnitState::Failed, true).lifecycle_state(),
            LifecycleState::Failed
        );
        assert_eq!(
            status(true, UnitState::Inactive, true).lifecycle_state(),
            LifecycleState::Enabled
        );
        assert_eq!(
            status(true, UnitState::Inactive, false).lifecycle_state(),
            LifecycleState::Inactive
        );
        assert_eq!(
            status(true, UnitState::Activating, false).lifecycle_state(),
            LifecycleState::Active
        );
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(status(true, UnitState::Active, true)).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["enabled"], true);
        assert!(json["main_pid"].is_null());
    }
}
