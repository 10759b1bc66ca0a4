//! Error types for service definition and lifecycle operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Main error type for every pysysd operation.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The definition failed validation; every collected problem is listed.
    #[error("Validation failed: {}", join_field_errors(.errors))]
    Validation { errors: Vec<FieldError> },

    /// A path outside a service definition could not be used.
    #[error("Path error for '{}': {message}", .path.display())]
    Path { path: PathBuf, message: String },

    /// Writing a unit file or definition record failed.
    #[error("Failed to write '{}': {message}", .path.display())]
    Write { path: PathBuf, message: String },

    /// `systemctl daemon-reload` failed (after its single retry).
    #[error("daemon-reload failed ({}): {diagnostics}", describe_exit_code(.exit_code))]
    Reload {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    /// The effective user cannot perform privileged operations.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// No stored definition or unit exists under this name.
    #[error("Service not found: {name}")]
    NotFound { name: String },

    /// An external command exceeded its timeout and was killed.
    #[error("'{command}' timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    /// An external program could not be started or waited on.
    #[error("Failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    /// An init-system command ran but reported failure.
    #[error("'{command}' failed ({}): {diagnostics}", describe_exit_code(.exit_code))]
    SystemdCommand {
        command: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    /// Deploying a unit failed; the service was rolled back to `state`.
    #[error("Deploy failed, service left in state '{state}': {source}")]
    Deploy {
        state: LifecycleState,
        source: Box<ServiceError>,
    },

    /// Definition store errors other than "not found".
    #[error("Store error: {message}")]
    Store { message: String },

    /// Template loading or rendering errors.
    #[error("Template error: {message}")]
    Template { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Build a validation error carrying a single field problem.
    pub fn invalid(error: FieldError) -> Self {
        ServiceError::Validation {
            errors: vec![error],
        }
    }

    /// Stable machine-readable code, used by the audit log.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Config { .. } => "CONFIG_ERROR",
            ServiceError::Validation { .. } => "VALIDATION_ERROR",
            ServiceError::Path { .. } => "PATH_ERROR",
            ServiceError::Write { .. } => "WRITE_ERROR",
            ServiceError::Reload { .. } => "RELOAD_ERROR",
            ServiceError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::Timeout { .. } => "TIMEOUT",
            ServiceError::Spawn { .. } => "SPAWN_ERROR",
            ServiceError::SystemdCommand { .. } => "SYSTEMD_COMMAND_ERROR",
            ServiceError::Deploy { .. } => "DEPLOY_ERROR",
            ServiceError::Store { .. } => "STORE_ERROR",
            ServiceError::Template { .. } => "TEMPLATE_ERROR",
            ServiceError::Io(_) => "IO_ERROR",
            ServiceError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Process exit code for the command-line front end.
    ///
    /// Validation, deploy and not-found failures each get a distinct code.
    pub fn exit_code(&self) -> u8 {
        match self {
            ServiceError::Validation { .. } => 2,
            ServiceError::Deploy { .. } => 3,
            ServiceError::NotFound { .. } => 4,
            ServiceError::PermissionDenied { .. } => 5,
            ServiceError::Timeout { .. } => 6,
            _ => 1,
        }
    }

    /// Field errors when this is a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ServiceError::Validation { errors } => errors,
            _ => &[],
        }
    }
}

/// A single problem found in a service definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid service name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("{field}: path '{}' must be absolute", .path.display())]
    NotAbsolute { field: &'static str, path: PathBuf },

    #[error("{field}: path '{}' does not exist", .path.display())]
    PathNotFound { field: &'static str, path: PathBuf },

    #[error("{field}: '{}' is not a directory", .path.display())]
    NotADirectory { field: &'static str, path: PathBuf },

    #[error("{field}: '{}' is not a regular file", .path.display())]
    NotAFile { field: &'static str, path: PathBuf },

    #[error("{field}: '{}' is not a .py file", .path.display())]
    NotPythonScript { field: &'static str, path: PathBuf },

    #[error("{field}: '{}' is not readable: {message}", .path.display())]
    NotReadable {
        field: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{field}: '{}' is not executable", .path.display())]
    NotExecutable { field: &'static str, path: PathBuf },

    #[error("invalid bind address '{value}': {reason}")]
    InvalidBindAddress { value: String, reason: String },

    #[error("invalid app module '{value}': {reason}")]
    InvalidAppModule { value: String, reason: String },

    #[error("invalid restart policy '{value}'")]
    InvalidRestartPolicy { value: String },

    #[error("invalid environment variable name '{name}'")]
    InvalidEnvironmentName { name: String },

    #[error("invalid value for '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    #[error("service name '{name}' appears more than once")]
    DuplicateName { name: String },
}

impl FieldError {
    /// Name of the definition field this error is about.
    pub fn field(&self) -> &str {
        match self {
            FieldError::InvalidName { .. } | FieldError::DuplicateName { .. } => "name",
            FieldError::MissingField { field }
            | FieldError::NotAbsolute { field, .. }
            | FieldError::PathNotFound { field, .. }
            | FieldError::NotADirectory { field, .. }
            | FieldError::NotAFile { field, .. }
            | FieldError::NotPythonScript { field, .. }
            | FieldError::NotReadable { field, .. }
            | FieldError::NotExecutable { field, .. } => field,
            FieldError::InvalidBindAddress { .. } => "bind_address",
            FieldError::InvalidAppModule { .. } => "app_module",
            FieldError::InvalidRestartPolicy { .. } => "restart_policy",
            FieldError::InvalidEnvironmentName { .. } => "environment",
            FieldError::InvalidParameter { field, .. } => field,
        }
    }
}

impl From<FieldError> for ServiceError {
    fn from(error: FieldError) -> Self {
        ServiceError::invalid(error)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Result type alias for pysysd operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let validation = ServiceError::invalid(FieldError::MissingField {
            field: "script_path",
        });
        let deploy = ServiceError::Deploy {
            state: LifecycleState::Validated,
            source: Box::new(ServiceError::Reload {
                exit_code: Some(1),
                diagnostics: "boom".to_string(),
            }),
        };
        let not_found = ServiceError::NotFound {
            name: "svc".to_string(),
        };

        assert_eq!(validation.exit_code(), 2);
        assert_eq!(deploy.exit_code(), 3);
        assert_eq!(not_found.exit_code(), 4);
    }

    #[test]
    fn test_validation_message_lists_all_errors() {
        let err = ServiceError::Validation {
            errors: vec![
                FieldError::MissingField {
                    field: "script_path",
                },
                FieldError::InvalidRestartPolicy {
                    value: "sometimes".to_string(),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("script_path"));
        assert!(message.contains("sometimes"));
    }

    #[test]
    fn test_command_error_shows_exit_code() {
        let err = ServiceError::SystemdCommand {
            command: "systemctl start svc".to_string(),
            exit_code: Some(5),
            diagnostics: "Unit svc.service not found.".to_string(),
        };
        assert!(err.to_string().contains("exit code 5"));
        assert!(err.to_string().contains("not found"));
        assert_eq!(err.code(), "SYSTEMD_COMMAND_ERROR");
    }

    #[test]
    fn test_field_names() {
        assert_eq!(
            FieldError::InvalidBindAddress {
                value: "localhost".to_string(),
                reason: "missing port".to_string()
            }
            .field(),
            "bind_address"
        );
        assert_eq!(
            FieldError::PathNotFound {
                field: "working_directory",
                path: PathBuf::from("/nope"),
            }
            .field(),
            "working_directory"
        );
    }
}
