//! Tera template engine wrapper.
//!
//! Holds the unit templates for every launcher kind and renders service
//! definitions into unit text.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::definition::{ServiceDefinition, ServiceTemplate, TemplateKind};
use crate::error::{FieldError, ServiceError, ServiceResult};

use super::escape::{environment_assignment, escape_specifiers, exec_command_line};

const STANDARD_PYTHON_TEMPLATE: &str = include_str!("units/standard_python.service.tera");
const GUNICORN_TEMPLATE: &str = include_str!("units/gunicorn.service.tera");

/// Search path appended after the virtual environment's `bin` directory.
const SYSTEM_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Variables handed to a unit template. Every value is already escaped.
#[derive(Debug, Serialize)]
struct UnitContext {
    name: String,
    description: String,
    exec_start: String,
    working_directory: String,
    user: Option<String>,
    group: Option<String>,
    restart_policy: String,
    restart_sec: u32,
    environment: Vec<String>,
}

fn template_name(kind: TemplateKind) -> String {
    format!("{}.service.tera", kind.as_str())
}

/// Template engine for rendering unit files.
///
/// Rendering is deterministic: the same definition always produces
/// byte-identical text.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
}

impl TemplateEngine {
    /// Create an engine with the built-in templates only.
    pub fn builtin() -> ServiceResult<Self> {
        Self::new(None)
    }

    /// Create an engine, letting `override_dir` replace built-in templates.
    ///
    /// A file named `<kind>.service.tera` (e.g. `gunicorn.service.tera`) in
    /// the directory takes the place of that kind's built-in template.
    pub fn new(override_dir: Option<&Path>) -> ServiceResult<Self> {
        let mut tera = Tera::default();

        for kind in TemplateKind::ALL {
            let name = template_name(kind);
            let builtin = match kind {
                TemplateKind::StandardPython => STANDARD_PYTHON_TEMPLATE,
                TemplateKind::Gunicorn => GUNICORN_TEMPLATE,
            };

            let source = match override_dir.map(|dir| dir.join(&name)) {
                Some(path) if path.is_file() => {
                    debug!(template = %name, path = %path.display(), "Using template override");
                    std::fs::read_to_string(&path).map_err(|e| ServiceError::Template {
                        message: format!("Failed to read template '{}': {}", path.display(), e),
                    })?
                }
                _ => builtin.to_string(),
            };

            tera.add_raw_template(&name, &source)
                .map_err(|e| ServiceError::Template {
                    message: format!("Failed to load template '{}': {}", name, e),
                })?;
        }

        info!(
            count = tera.get_template_names().count(),
            "Template engine initialized"
        );

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Check if a template exists.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a definition into unit file text.
    ///
    /// Fails only if a required template field is missing, which cannot
    /// happen for a definition that passed validation.
    pub fn render(&self, def: &ServiceDefinition) -> ServiceResult<String> {
        let context = build_context(def)?;
        let tera_context = Context::from_serialize(&context).map_err(|e| ServiceError::Template {
            message: format!("Invalid template context: {}", e),
        })?;

        let name = template_name(def.template_kind());
        self.tera
            .render(&name, &tera_context)
            .map_err(|e| ServiceError::Template {
                message: format!("Failed to render template '{}': {}", name, e),
            })
    }
}

fn missing(field: &'static str) -> ServiceError {
    ServiceError::invalid(FieldError::MissingField { field })
}

fn exec_tokens(def: &ServiceDefinition) -> ServiceResult<Vec<String>> {
    let interpreter = def.interpreter().to_string_lossy().into_owned();

    match &def.template {
        ServiceTemplate::StandardPython {
            script_path,
            script_args,
        } => {
            let script_path = script_path.as_ref().ok_or_else(|| missing("script_path"))?;
            let mut tokens = vec![interpreter, script_path.to_string_lossy().into_owned()];
            tokens.extend(script_args.iter().cloned());
            Ok(tokens)
        }
        ServiceTemplate::Gunicorn {
            bind_address,
            app_module,
        } => {
            let bind_address = bind_address.as_ref().ok_or_else(|| missing("bind_address"))?;
            let app_module = app_module.as_ref().ok_or_else(|| missing("app_module"))?;
            Ok(vec![
                interpreter,
                "-m".to_string(),
                "gunicorn".to_string(),
                "--bind".to_string(),
                bind_address.clone(),
                app_module.clone(),
            ])
        }
    }
}

/// `PATH` and `PYTHONUNBUFFERED` come first unless the definition sets
/// them itself; the definition's own variables follow in insertion order.
fn environment_lines(def: &ServiceDefinition) -> Vec<String> {
    let venv_bin = def.venv_path.join("bin");
    let defaults = [
        ("PATH", format!("{}:{}", venv_bin.display(), SYSTEM_PATH)),
        ("PYTHONUNBUFFERED", "1".to_string()),
    ];

    defaults
        .iter()
        .filter(|(name, _)| !def.environment.contains(name))
        .map(|(name, value)| environment_assignment(name, value))
        .chain(
            def.environment
                .iter()
                .map(|(name, value)| environment_assignment(name, value)),
        )
        .collect()
}

fn build_context(def: &ServiceDefinition) -> ServiceResult<UnitContext> {
    Ok(UnitContext {
        name: def.name.clone(),
        description: escape_specifiers(&def.description),
        exec_start: exec_command_line(exec_tokens(def)?),
        working_directory: escape_specifiers(&def.working_directory.to_string_lossy()),
        user: def.user.as_deref().map(escape_specifiers),
        group: def.group.as_deref().map(escape_specifiers),
        restart_policy: def.restart_policy.clone(),
        restart_sec: def.restart_sec,
        environment: environment_lines(def),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scenario_a() -> ServiceDefinition {
        let mut def = ServiceDefinition::new(
            "svc1",
            ServiceTemplate::script("/opt/app/run.py", vec![]),
            "/opt/app",
            "/opt/app/venv",
        );
        def.restart_policy = "always".to_string();
        def
    }

    fn scenario_b() -> ServiceDefinition {
        ServiceDefinition::new(
            "web",
            ServiceTemplate::gunicorn("0.0.0.0:8000", "app:app"),
            "/opt/web",
            "/opt/web/venv",
        )
    }

    #[test]
    fn test_builtin_templates_loaded() {
        let engine = TemplateEngine::builtin().unwrap();
        assert!(engine.has_template("standard_python.service.tera"));
        assert!(engine.has_template("gunicorn.service.tera"));
    }

    #[test]
    fn test_render_standard_python() {
        let engine = TemplateEngine::builtin().unwrap();
        let unit = engine.render(&scenario_a()).unwrap();

        assert!(unit.contains("ExecStart=/opt/app/venv/bin/python /opt/app/run.py\n"));
        assert!(unit.contains("Restart=always\n"));
        assert!(unit.contains("RestartSec=3\n"));
        assert!(unit.contains("WorkingDirectory=/opt/app\n"));
        assert!(unit.contains("Description=Python service svc1\n"));
        assert!(unit.contains("[Install]\nWantedBy=multi-user.target\n"));
        assert!(!unit.contains("User="));
        assert!(!unit.contains("Group="));
    }

    #[test]
    fn test_render_exact_layout() {
        let engine = TemplateEngine::builtin().unwrap();
        let mut def = scenario_a();
        def.user = Some("deploy".to_string());
        def.environment.set("MODE", "prod");

        let expected = "\
[Unit]
Description=Python service svc1
After=network.target

[Service]
Type=simple
ExecStart=/opt/app/venv/bin/python /opt/app/run.py
WorkingDirectory=/opt/app
User=deploy
Restart=always
RestartSec=3
Environment=PATH=/opt/app/venv/bin:/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin
Environment=PYTHONUNBUFFERED=1
Environment=MODE=prod

[Install]
WantedBy=multi-user.target
";
        assert_eq!(engine.render(&def).unwrap(), expected);
    }

    #[test]
    fn test_render_gunicorn() {
        let engine = TemplateEngine::builtin().unwrap();
        let unit = engine.render(&scenario_b()).unwrap();

        assert!(unit.contains(
            "ExecStart=/opt/web/venv/bin/python -m gunicorn --bind 0.0.0.0:8000 app:app\n"
        ));
        assert!(unit.contains("--bind 0.0.0.0:8000"));
        assert!(unit.contains("app:app"));
        assert!(unit.contains("KillMode=mixed\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let engine = TemplateEngine::builtin().unwrap();
        let mut def = scenario_a();
        def.environment.set("B", "2");
        def.environment.set("A", "1");
        assert_eq!(engine.render(&def).unwrap(), engine.render(&def).unwrap());
    }

    #[test]
    fn test_environment_order_follows_insertion() {
        let engine = TemplateEngine::builtin().unwrap();

        let mut first = scenario_a();
        first.environment.set("ALPHA", "1");
        first.environment.set("BETA", "2");

        let mut second = scenario_a();
        second.environment.set("BETA", "2");
        second.environment.set("ALPHA", "1");

        let first = engine.render(&first).unwrap();
        let second = engine.render(&second).unwrap();
        assert!(first.find("ALPHA=1").unwrap() < first.find("BETA=2").unwrap());
        assert!(second.find("BETA=2").unwrap() < second.find("ALPHA=1").unwrap());
    }

    #[test]
    fn test_user_environment_overrides_defaults() {
        let engine = TemplateEngine::builtin().unwrap();
        let mut def = scenario_a();
        def.environment.set("PYTHONUNBUFFERED", "0");
        let unit = engine.render(&def).unwrap();
        assert!(unit.contains("Environment=PYTHONUNBUFFERED=0\n"));
        assert!(!unit.contains("PYTHONUNBUFFERED=1"));
    }

    #[test]
    fn test_arguments_with_whitespace_stay_single() {
        let engine = TemplateEngine::builtin().unwrap();
        let mut def = scenario_a();
        def.template = ServiceTemplate::script(
            "/opt/app/run.py",
            vec!["--name".to_string(), "two words".to_string()],
        );
        let unit = engine.render(&def).unwrap();
        assert!(unit.contains("/opt/app/run.py --name \"two words\"\n"));
    }

    #[test]
    fn test_group_rendered_when_set() {
        let engine = TemplateEngine::builtin().unwrap();
        let mut def = scenario_a();
        def.user = Some("app".to_string());
        def.group = Some("www-data".to_string());
        let unit = engine.render(&def).unwrap();
        assert!(unit.contains("User=app\nGroup=www-data\n"));
    }

    #[test]
    fn test_render_missing_field() {
        let engine = TemplateEngine::builtin().unwrap();
        let mut def = scenario_b();
        def.template = ServiceTemplate::Gunicorn {
            bind_address: Some("0.0.0.0:8000".to_string()),
            app_module: None,
        };
        assert!(matches!(
            engine.render(&def),
            Err(ServiceError::Validation { .. })
        ));
    }

    #[test]
    fn test_override_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("gunicorn.service.tera"),
            b"# custom {{ name }}\nExecStart={{ exec_start }}\n",
        )
        .unwrap();

        let engine = TemplateEngine::new(Some(dir.path())).unwrap();
        let unit = engine.render(&scenario_b()).unwrap();
        assert!(unit.starts_with("# custom web\n"));

        // Kinds without an override keep the built-in template.
        let unit = engine.render(&scenario_a()).unwrap();
        assert!(unit.starts_with("[Unit]\n"));
    }

    #[test]
    fn test_broken_override_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("standard_python.service.tera"), b"{% if %}").unwrap();
        assert!(matches!(
            TemplateEngine::new(Some(dir.path())),
            Err(ServiceError::Template { .. })
        ));
    }
}
