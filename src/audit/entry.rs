//! Audit entry types.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::ServiceError;
use crate::lifecycle::LifecycleState;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub timestamp: String,
    /// Lifecycle operation, e.g. `create` or `remove`.
    pub operation: String,
    /// Service the operation acted on.
    pub service: String,
    /// Real UID of the invoking process.
    pub uid: u32,
    pub result: AuditResult,
    pub duration_ms: u64,
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuditResult {
    Success {
        /// State the service reached, when the operation moves it.
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<LifecycleState>,
    },
    Failure {
        error_code: String,
        error_message: String,
    },
}

impl AuditResult {
    pub fn from_error(error: &ServiceError) -> Self {
        AuditResult::Failure {
            error_code: error.code().to_string(),
            error_message: error.to_string(),
        }
    }
}

impl AuditEntry {
    /// Entry stamped with the current time and the caller's UID.
    pub fn now(operation: &str, service: &str, result: AuditResult, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            operation: operation.to_string(),
            service: service.to_string(),
            uid: nix::unistd::getuid().as_raw(),
            result,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serialization() {
        let entry = AuditEntry::now(
            "deploy",
            "svc1",
            AuditResult::Success {
                state: Some(LifecycleState::Deployed),
            },
            15,
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["operation"], "deploy");
        assert_eq!(json["service"], "svc1");
        assert_eq!(json["result"]["status"], "success");
        assert_eq!(json["result"]["state"], "deployed");
        assert_eq!(json["duration_ms"], 15);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_failure_serialization() {
        let error = ServiceError::NotFound {
            name: "svc1".to_string(),
        };
        let entry = AuditEntry::now("remove", "svc1", AuditResult::from_error(&error), 1);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["result"]["status"], "failure");
        assert_eq!(json["result"]["error_code"], "NOT_FOUND");
        assert_eq!(json["result"]["error_message"], "Service not found: svc1");
    }

    #[test]
    fn test_success_without_state() {
        let json = serde_json::to_string(&AuditResult::Success { state: None }).unwrap();
        assert_eq!(json, r#"{"status":"success"}"#);
    }
}
