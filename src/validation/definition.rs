//! Whole-definition validation.

use std::path::Path;

use tracing::debug;

use crate::definition::{RestartPolicy, ServiceDefinition, ServiceTemplate};
use crate::error::{FieldError, ServiceError, ServiceResult};

use super::gunicorn::{validate_app_module, validate_bind_address};
use super::path::{check_directory, check_interpreter, check_python_script};
use super::service_name::validate_service_name;
use super::username::validate_account_name;

/// Validate a service definition, collecting every problem found.
///
/// Checks run in a fixed order: name, description, required template
/// fields, paths, Gunicorn settings, restart policy, arguments and
/// environment, then user and group. Naming and format errors accumulate;
/// each path field reports only its first filesystem problem.
///
/// Reads the filesystem but never writes to it.
pub fn validate_definition(def: &ServiceDefinition) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut collect = |result: Result<(), FieldError>| {
        if let Err(e) = result {
            errors.push(e);
        }
    };

    collect(validate_service_name(&def.name));
    collect(
        reject_control_chars("description", &def.description, true)
            .and_then(|()| reject_line_continuation("description", &def.description)),
    );

    collect(require_path("working_directory", &def.working_directory));
    collect(require_path("venv_path", &def.venv_path));
    match &def.template {
        ServiceTemplate::StandardPython { script_path, .. } => {
            if script_path.is_none() {
                collect(Err(FieldError::MissingField {
                    field: "script_path",
                }));
            }
        }
        ServiceTemplate::Gunicorn {
            bind_address,
            app_module,
        } => {
            if bind_address.is_none() {
                collect(Err(FieldError::MissingField {
                    field: "bind_address",
                }));
            }
            if app_module.is_none() {
                collect(Err(FieldError::MissingField {
                    field: "app_module",
                }));
            }
        }
    }

    if !def.working_directory.as_os_str().is_empty() {
        collect(
            check_directory("working_directory", &def.working_directory).and_then(|()| {
                reject_line_continuation(
                    "working_directory",
                    &def.working_directory.to_string_lossy(),
                )
            }),
        );
    }
    if !def.venv_path.as_os_str().is_empty() {
        collect(check_interpreter("venv_path", &def.venv_path));
    }

    match &def.template {
        ServiceTemplate::StandardPython {
            script_path,
            script_args,
        } => {
            if let Some(script_path) = script_path {
                collect(check_python_script("script_path", script_path));
            }
            for arg in script_args {
                collect(reject_control_chars("script_args", arg, false));
            }
        }
        ServiceTemplate::Gunicorn {
            bind_address,
            app_module,
        } => {
            if let Some(bind_address) = bind_address {
                collect(validate_bind_address(bind_address));
            }
            if let Some(app_module) = app_module {
                collect(validate_app_module(app_module));
            }
        }
    }

    if def.restart_policy.parse::<RestartPolicy>().is_err() {
        collect(Err(FieldError::InvalidRestartPolicy {
            value: def.restart_policy.clone(),
        }));
    }

    for (name, value) in def.environment.iter() {
        collect(validate_environment_name(name));
        collect(reject_control_chars("environment", value, false));
    }

    if let Some(user) = &def.user {
        collect(validate_account_name("user", user));
    }
    if let Some(group) = &def.group {
        collect(validate_account_name("group", group));
    }

    debug!(
        service = %def.name,
        error_count = errors.len(),
        "Service definition validated"
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// [`validate_definition`] with the errors wrapped as a [`ServiceError`].
pub fn validate(def: &ServiceDefinition) -> ServiceResult<()> {
    validate_definition(def).map_err(|errors| ServiceError::Validation { errors })
}

/// Validate an environment variable name (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn validate_environment_name(name: &str) -> Result<(), FieldError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(FieldError::InvalidEnvironmentName {
            name: name.to_string(),
        })
    }
}

fn require_path(field: &'static str, path: &Path) -> Result<(), FieldError> {
    if path.as_os_str().is_empty() {
        Err(FieldError::MissingField { field })
    } else {
        Ok(())
    }
}

/// Line breaks and NUL would end the unit directive early; `strict` also
/// rejects tabs and every other control character.
fn reject_control_chars(field: &str, value: &str, strict: bool) -> Result<(), FieldError> {
    let bad = value.chars().find(|c| {
        if strict {
            c.is_control()
        } else {
            matches!(c, '\n' | '\r' | '\0')
        }
    });

    match bad {
        Some(c) => Err(FieldError::InvalidParameter {
            field: field.to_string(),
            message: format!("contains control character {:?}", c),
        }),
        None => Ok(()),
    }
}

/// systemd joins a line ending in `\` with the next one, which would swallow
/// the following directive.
fn reject_line_continuation(field: &str, value: &str) -> Result<(), FieldError> {
    if value.ends_with('\\') {
        Err(FieldError::InvalidParameter {
            field: field.to_string(),
            message: "must not end with a backslash".to_string(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path().to_path_buf();
            fs::create_dir_all(root.join("venv/bin")).unwrap();
            let python = root.join("venv/bin/python");
            fs::write(&python, "#!/bin/sh\n").unwrap();
            fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();
            fs::write(root.join("run.py"), "print('hi')\n").unwrap();
            Self { _dir: dir, root }
        }

        fn script(&self, name: &str) -> ServiceDefinition {
            ServiceDefinition::new(
                name,
                ServiceTemplate::script(self.root.join("run.py"), vec![]),
                &self.root,
                self.root.join("venv"),
            )
        }

        fn gunicorn(&self, bind: &str, app: &str) -> ServiceDefinition {
            ServiceDefinition::new(
                "web",
                ServiceTemplate::gunicorn(bind, app),
                &self.root,
                self.root.join("venv"),
            )
        }
    }

    #[test]
    fn test_valid_script_definition() {
        let fx = Fixture::new();
        assert_eq!(validate_definition(&fx.script("svc1")), Ok(()));
    }

    #[test]
    fn test_valid_gunicorn_definition() {
        let fx = Fixture::new();
        assert_eq!(validate_definition(&fx.gunicorn("0.0.0.0:8000", "app:app")), Ok(()));
    }

    #[test]
    fn test_invalid_name() {
        let fx = Fixture::new();
        let errors = validate_definition(&fx.script("../bad")).unwrap_err();
        assert!(matches!(errors[0], FieldError::InvalidName { .. }));
    }

    #[test]
    fn test_missing_script_path() {
        let fx = Fixture::new();
        let mut def = fx.script("svc1");
        def.template = ServiceTemplate::StandardPython {
            script_path: None,
            script_args: vec![],
        };
        let errors = validate_definition(&def).unwrap_err();
        assert_eq!(
            errors,
            vec![FieldError::MissingField {
                field: "script_path"
            }]
        );
    }

    #[test]
    fn test_bind_address_without_port() {
        let fx = Fixture::new();
        let errors = validate_definition(&fx.gunicorn("localhost", "app:app")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], FieldError::InvalidBindAddress { .. }));
    }

    #[test]
    fn test_format_errors_accumulate() {
        let fx = Fixture::new();
        let mut def = fx.gunicorn("localhost", "app");
        def.name = "bad name".to_string();
        def.restart_policy = "sometimes".to_string();
        def.environment.set("1BAD", "x");

        let errors = validate_definition(&def).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field()).collect();
        assert_eq!(
            fields,
            vec!["name", "bind_address", "app_module", "restart_policy", "environment"]
        );
    }

    #[test]
    fn test_missing_paths_reported_once() {
        let fx = Fixture::new();
        let mut def = fx.script("svc1");
        def.working_directory = fx.root.join("missing");
        def.venv_path = PathBuf::new();

        let errors = validate_definition(&def).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0],
            FieldError::MissingField { field: "venv_path" }
        );
        assert!(matches!(
            errors[1],
            FieldError::PathNotFound {
                field: "working_directory",
                ..
            }
        ));
    }

    #[test]
    fn test_description_newline_rejected() {
        let fx = Fixture::new();
        let mut def = fx.script("svc1");
        def.description = "ok\nExecStartPre=/bin/sh".to_string();
        let errors = validate_definition(&def).unwrap_err();
        assert_eq!(errors[0].field(), "description");
    }

    #[test]
    fn test_description_trailing_backslash_rejected() {
        let fx = Fixture::new();
        let mut def = fx.script("svc1");
        def.description = "Worker \\".to_string();

        let errors = validate_definition(&def).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field(), "description");
    }

    #[test]
    fn test_working_directory_trailing_backslash_rejected() {
        let fx = Fixture::new();
        let app = fx.root.join("app\\");
        fs::create_dir_all(&app).unwrap();
        let mut def = fx.script("svc1");
        def.working_directory = app;

        let errors = validate_definition(&def).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            FieldError::InvalidParameter { field, .. } if field == "working_directory"
        ));
    }

    #[test]
    fn test_inner_backslash_in_description_allowed() {
        let fx = Fixture::new();
        let mut def = fx.script("svc1");
        def.description = r"Reads C:\data exports".to_string();
        assert_eq!(validate_definition(&def), Ok(()));
    }

    #[test]
    fn test_environment_value_newline_rejected() {
        let fx = Fixture::new();
        let mut def = fx.script("svc1");
        def.environment.set("TOKEN", "abc\ndef");
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn test_invalid_user() {
        let fx = Fixture::new();
        let mut def = fx.script("svc1");
        def.user = Some("Root Admin".to_string());
        let errors = validate_definition(&def).unwrap_err();
        assert_eq!(errors[0].field(), "user");
    }

    #[test]
    fn test_validate_wraps_errors() {
        let fx = Fixture::new();
        let result = validate(&fx.script("../bad"));
        assert!(matches!(result, Err(ServiceError::Validation { .. })));
    }

    #[test]
    fn test_environment_names() {
        assert!(validate_environment_name("PATH").is_ok());
        assert!(validate_environment_name("_private").is_ok());
        assert!(validate_environment_name("DB_URL_2").is_ok());
        assert!(validate_environment_name("").is_err());
        assert!(validate_environment_name("2FAST").is_err());
        assert!(validate_environment_name("MY-VAR").is_err());
    }
}
