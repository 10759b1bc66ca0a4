//! Account name validation for `User=` and `Group=`.

use crate::error::FieldError;

/// Maximum length for system user and group names (Linux standard).
const MAX_ACCOUNT_NAME_LENGTH: usize = 32;

/// Validate a user or group name for use in a unit file.
///
/// Rules:
/// - Must not be empty or exceed 32 characters
/// - Either all digits (a numeric ID), or
/// - Starts with a lowercase letter or underscore, continues with
///   lowercase letters, digits, underscores or hyphens, and may end in `$`
///
/// Whether the account exists is left to systemd at start time.
pub fn validate_account_name(field: &str, name: &str) -> Result<(), FieldError> {
    let invalid = |message: String| FieldError::InvalidParameter {
        field: field.to_string(),
        message,
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty".to_string()));
    }

    if name.len() > MAX_ACCOUNT_NAME_LENGTH {
        return Err(invalid(format!(
            "name exceeds maximum length of {} characters",
            MAX_ACCOUNT_NAME_LENGTH
        )));
    }

    if name.chars().all(|c| c.is_ascii_digit()) {
        return Ok(());
    }

    let body = name.strip_suffix('$').unwrap_or(name);
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => {
            return Err(invalid(
                "name must start with a lowercase letter or underscore".to_string(),
            ))
        }
    }

    if let Some(c) = chars.find(|c| {
        !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '_' && *c != '-'
    }) {
        return Err(invalid(format!("name contains invalid character {:?}", c)));
    }

    Ok(())
}
