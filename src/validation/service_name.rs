//! Service name validation.
//!
//! Service names become unit file stems and definition record file names,
//! so they are limited to a character set that is safe in both places.

use crate::error::FieldError;

/// Longest allowed name: systemd caps unit names at 256 bytes and
/// `.service` takes 8 of them (plus one spare for the terminator).
pub const MAX_SERVICE_NAME_LENGTH: usize = 247;

/// Validate that a service name is systemd-safe.
///
/// Rules:
/// - Must not be empty
/// - Must not exceed [`MAX_SERVICE_NAME_LENGTH`] characters
/// - May only contain ASCII letters, digits, hyphens and underscores
///
/// # Example
///
/// ```
/// use pysysd::validation::validate_service_name;
///
/// assert!(validate_service_name("billing-worker").is_ok());
/// assert!(validate_service_name("../bad").is_err());
/// ```
pub fn validate_service_name(name: &str) -> Result<(), FieldError> {
    let invalid = |reason: String| FieldError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty".to_string()));
    }

    if name.len() > MAX_SERVICE_NAME_LENGTH {
        return Err(invalid(format!(
            "name exceeds maximum length of {} characters",
            MAX_SERVICE_NAME_LENGTH
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(invalid(format!(
            "invalid character {:?}; only letters, digits, '-' and '_' are allowed",
            c
        )));
    }

    Ok(())
}
