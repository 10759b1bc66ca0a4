//! Gunicorn bind address and application module validation.

use std::net::Ipv6Addr;

use crate::error::FieldError;

/// Validate a `host:port` bind address.
///
/// IPv6 hosts must be bracketed (`[::1]:8000`). The port must be in
/// 1..=65535.
pub fn validate_bind_address(value: &str) -> Result<(), FieldError> {
    let invalid = |reason: &str| FieldError::InvalidBindAddress {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("bind address cannot be empty"));
    }

    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, port) = rest
            .split_once("]:")
            .ok_or_else(|| invalid("expected [ipv6]:port"))?;
        if host.parse::<Ipv6Addr>().is_err() {
            return Err(invalid("bracketed host is not an IPv6 address"));
        }
        (host, port)
    } else {
        let (host, port) = value
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port, expected host:port"))?;
        if host.contains(':') {
            return Err(invalid("IPv6 hosts must be written as [addr]:port"));
        }
        if host
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_')
        {
            return Err(invalid("host contains invalid characters"));
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(invalid("missing host, expected host:port"));
    }

    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("port must be a number"));
    }

    match port.parse::<u16>() {
        Ok(p) if p >= 1 => Ok(()),
        _ => Err(invalid("port must be between 1 and 65535")),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a WSGI `module:callable` reference.
///
/// The module is a dotted path of Python identifiers. The callable is an
/// identifier, optionally followed by a parenthesised argument list for
/// application factories (`app:create_app()`).
pub fn validate_app_module(value: &str) -> Result<(), FieldError> {
    let invalid = |reason: &str| FieldError::InvalidAppModule {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let (module, callable) = value
        .split_once(':')
        .ok_or_else(|| invalid("expected module:callable"))?;

    if module.is_empty() || !module.split('.').all(is_identifier) {
        return Err(invalid("module must be a dotted Python name"));
    }

    let callable_name = match callable.find('(') {
        Some(open) if callable.ends_with(')') => &callable[..open],
        Some(_) => return Err(invalid("unbalanced parentheses in callable")),
        None => callable,
    };

    if !is_identifier(callable_name) {
        return Err(invalid("callable must be a Python identifier"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bind_addresses() {
        assert!(validate_bind_address("0.0.0.0:8000").is_ok());
        assert!(validate_bind_address("localhost:80").is_ok());
        assert!(validate_bind_address("127.0.0.1:65535").is_ok());
        assert!(validate_bind_address("[::1]:8080").is_ok());
        assert!(validate_bind_address("web-1.internal:1").is_ok());
    }

    #[test]
    fn test_missing_port() {
        assert!(matches!(
            validate_bind_address("localhost"),
            Err(FieldError::InvalidBindAddress { .. })
        ));
        assert!(validate_bind_address("localhost:").is_err());
    }

    #[test]
    fn test_port_range() {
        assert!(validate_bind_address("0.0.0.0:0").is_err());
        assert!(validate_bind_address("0.0.0.0:65536").is_err());
        assert!(validate_bind_address("0.0.0.0:http").is_err());
        assert!(validate_bind_address("0.0.0.0:-1").is_err());
    }

    #[test]
    fn test_bad_hosts() {
        assert!(validate_bind_address(":8000").is_err());
        assert!(validate_bind_address("::1:8000").is_err());
        assert!(validate_bind_address("[nothost]:8000").is_err());
        assert!(validate_bind_address("host name:8000").is_err());
    }

    #[test]
    fn test_valid_app_modules() {
        assert!(validate_app_module("app:app").is_ok());
        assert!(validate_app_module("mysite.wsgi:application").is_ok());
        assert!(validate_app_module("factory:create_app()").is_ok());
        assert!(validate_app_module("factory:create_app(debug=False)").is_ok());
    }

    #[test]
    fn test_invalid_app_modules() {
        assert!(matches!(
            validate_app_module("app"),
            Err(FieldError::InvalidAppModule { .. })
        ));
        assert!(validate_app_module(":app").is_err());
        assert!(validate_app_module("app:").is_err());
        assert!(validate_app_module("my-site.wsgi:app").is_err());
        assert!(validate_app_module("app:create_app(").is_err());
        assert!(validate_app_module("pkg..mod:app").is_err());
    }
}
