//! Lifecycle states.

use std::fmt;

use serde::Serialize;

/// Where a service stands between its definition and a running unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Built but not yet checked.
    Draft,
    /// Passed validation; no unit file on disk.
    Validated,
    /// Unit text produced and the definition saved.
    Rendered,
    /// Unit file written and systemd reloaded.
    Deployed,
    Enabled,
    Active,
    Inactive,
    Failed,
    /// Unit file deleted; the stored definition may remain.
    Removed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Draft => "draft",
            LifecycleState::Validated => "validated",
            LifecycleState::Rendered => "rendered",
            LifecycleState::Deployed => "deployed",
            LifecycleState::Enabled => "enabled",
            LifecycleState::Active => "active",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Failed => "failed",
            LifecycleState::Removed => "removed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
