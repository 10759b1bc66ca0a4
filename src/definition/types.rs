//! Service definition types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::environment::Environment;

/// Default delay before systemd restarts a service, in seconds.
pub const DEFAULT_RESTART_SEC: u32 = 3;

/// Declarative description of a Python process to run under systemd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unit file stem; unique within the definition store.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// How the process is launched, with the fields that launcher needs.
    pub template: ServiceTemplate,
    pub working_directory: PathBuf,
    /// Virtual environment whose `bin/python` runs the service.
    pub venv_path: PathBuf,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    /// Value for `Restart=`; kept as text so hand-edited records are
    /// checked by the validator rather than rejected on load.
    #[serde(default = "default_restart_policy")]
    pub restart_policy: String,
    #[serde(default = "default_restart_sec")]
    pub restart_sec: u32,
    #[serde(default)]
    pub environment: Environment,
}

/// Launcher-specific settings.
///
/// Required fields are optional here so an incomplete definition can still
/// be handed to the validator, which reports each missing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceTemplate {
    /// A plain Python script run by the environment's interpreter.
    StandardPython {
        script_path: Option<PathBuf>,
        #[serde(default)]
        script_args: Vec<String>,
    },
    /// A WSGI application served by Gunicorn.
    Gunicorn {
        bind_address: Option<String>,
        app_module: Option<String>,
    },
}

/// Discriminant of [`ServiceTemplate`], without its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    StandardPython,
    Gunicorn,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 2] = [TemplateKind::StandardPython, TemplateKind::Gunicorn];

    /// Identifier used in records, template names and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::StandardPython => "standard_python",
            TemplateKind::Gunicorn => "gunicorn",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TemplateKind::StandardPython => "Standard Python Script",
            TemplateKind::Gunicorn => "Gunicorn Web Application",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown template '{}'", s))
    }
}

impl ServiceTemplate {
    pub fn kind(&self) -> TemplateKind {
        match self {
            ServiceTemplate::StandardPython { .. } => TemplateKind::StandardPython,
            ServiceTemplate::Gunicorn { .. } => TemplateKind::Gunicorn,
        }
    }

    /// A standard script template with the given script and arguments.
    pub fn script(script_path: impl Into<PathBuf>, script_args: Vec<String>) -> Self {
        ServiceTemplate::StandardPython {
            script_path: Some(script_path.into()),
            script_args,
        }
    }

    /// A Gunicorn template serving `app_module` on `bind_address`.
    pub fn gunicorn(bind_address: impl Into<String>, app_module: impl Into<String>) -> Self {
        ServiceTemplate::Gunicorn {
            bind_address: Some(bind_address.into()),
            app_module: Some(app_module.into()),
        }
    }
}

/// Recognized values of systemd's `Restart=` setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RestartPolicy {
    No,
    #[default]
    Always,
    OnSuccess,
    OnFailure,
    OnAbnormal,
    OnAbort,
    OnWatchdog,
}

impl RestartPolicy {
    pub const ALL: [RestartPolicy; 7] = [
        RestartPolicy::No,
        RestartPolicy::Always,
        RestartPolicy::OnSuccess,
        RestartPolicy::OnFailure,
        RestartPolicy::OnAbnormal,
        RestartPolicy::OnAbort,
        RestartPolicy::OnWatchdog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::OnSuccess => "on-success",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::OnAbnormal => "on-abnormal",
            RestartPolicy::OnAbort => "on-abort",
            RestartPolicy::OnWatchdog => "on-watchdog",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RestartPolicy::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

fn default_restart_policy() -> String {
    RestartPolicy::default().as_str().to_string()
}

fn default_restart_sec() -> u32 {
    DEFAULT_RESTART_SEC
}

impl ServiceDefinition {
    /// Create a definition with default restart settings and no
    /// user, group or extra environment.
    pub fn new(
        name: impl Into<String>,
        template: ServiceTemplate,
        working_directory: impl Into<PathBuf>,
        venv_path: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        Self {
            description: format!("Python service {}", name),
            name,
            template,
            working_directory: working_directory.into(),
            venv_path: venv_path.into(),
            user: None,
            group: None,
            restart_policy: default_restart_policy(),
            restart_sec: DEFAULT_RESTART_SEC,
            environment: Environment::new(),
        }
    }

    /// Path of the interpreter inside the virtual environment.
    pub fn interpreter(&self) -> PathBuf {
        interpreter_path(&self.venv_path)
    }

    pub fn template_kind(&self) -> TemplateKind {
        self.template.kind()
    }
}

/// `<venv>/bin/python`.
pub fn interpreter_path(venv_path: &Path) -> PathBuf {
    venv_path.join("bin").join("python")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServiceDefinition {
        let mut def = ServiceDefinition::new(
            "svc1",
            ServiceTemplate::script("/opt/app/run.py", vec!["--port".into(), "80".into()]),
            "/opt/app",
            "/opt/app/venv",
        );
        def.environment.set("B", "2");
        def.environment.set("A", "1");
        def
    }

    #[test]
    fn test_new_uses_defaults() {
        let def = sample();
        assert_eq!(def.restart_policy, "always");
        assert_eq!(def.restart_sec, 3);
        assert_eq!(def.description, "Python service svc1");
        assert_eq!(def.interpreter(), PathBuf::from("/opt/app/venv/bin/python"));
    }

    #[test]
    fn test_record_layout() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["template"]["kind"], "standard_python");
        assert_eq!(json["template"]["script_path"], "/opt/app/run.py");
        assert_eq!(json["template"]["script_args"][1], "80");
        assert!(json["template"].get("bind_address").is_none());
        assert_eq!(json["restart_policy"], "always");
    }

    #[test]
    fn test_gunicorn_record_has_no_script_fields() {
        let def = ServiceDefinition::new(
            "web",
            ServiceTemplate::gunicorn("0.0.0.0:8000", "app:app"),
            "/srv/web",
            "/srv/web/venv",
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["template"]["kind"], "gunicorn");
        assert!(json["template"].get("script_path").is_none());

        let back: ServiceDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_missing_optional_fields_take_defaults() {
        let json = serde_json::json!({
            "name": "bare",
            "template": {"kind": "standard_python", "script_path": "/x/run.py"},
            "working_directory": "/x",
            "venv_path": "/x/venv"
        });
        let def: ServiceDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.restart_policy, "always");
        assert_eq!(def.restart_sec, 3);
        assert!(def.environment.is_empty());
        assert_eq!(
            def.template,
            ServiceTemplate::StandardPython {
                script_path: Some(PathBuf::from("/x/run.py")),
                script_args: vec![],
            }
        );
    }

    #[test]
    fn test_restart_policy_parsing() {
        for policy in RestartPolicy::ALL {
            assert_eq!(policy.as_str().parse::<RestartPolicy>(), Ok(policy));
        }
        assert!("sometimes".parse::<RestartPolicy>().is_err());
        assert!("Always".parse::<RestartPolicy>().is_err());
    }

    #[test]
    fn test_template_kind_parsing() {
        assert_eq!("gunicorn".parse::<TemplateKind>(), Ok(TemplateKind::Gunicorn));
        assert_eq!(
            "standard_python".parse::<TemplateKind>(),
            Ok(TemplateKind::StandardPython)
        );
        assert!("flask".parse::<TemplateKind>().is_err());
    }
}
