//! Argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nix::unistd::{getuid, User};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::definition::{
    Environment, ServiceDefinition, ServiceTemplate, TemplateKind, DEFAULT_RESTART_SEC,
};
use crate::error::{FieldError, ServiceError, ServiceResult};
use crate::store::DefinitionStore;

#[derive(Debug, Parser)]
#[command(name = "pysysd")]
#[command(version, about = "Deploy Python programs as systemd services")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate and save a service, optionally deploying and starting it
    Create(CreateArgs),

    /// Print the unit file a definition would produce
    Preview(DefinitionArgs),

    /// List saved service definitions
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the state of a service
    Status {
        name: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Start a deployed service
    Start { name: String },

    /// Stop a running service
    Stop { name: String },

    /// Restart a deployed service
    Restart { name: String },

    /// Enable a service to start at boot
    Enable { name: String },

    /// Disable a service from starting at boot
    Disable { name: String },

    /// Stop, disable and delete a service's unit file
    Remove {
        name: String,
        /// Also delete the saved definition
        #[arg(long)]
        purge: bool,
    },

    /// Write the unit for a saved definition and reload systemd
    Deploy { name: String },

    /// Delete a saved definition, leaving any unit in place
    Forget { name: String },
}

/// Flags describing one service, or record files to read instead.
#[derive(Debug, Clone, Args)]
pub struct DefinitionArgs {
    /// Read definitions from saved record files instead of flags
    #[arg(
        long = "load",
        value_name = "FILE",
        conflicts_with_all = ["name", "working_dir", "venv", "script", "bind", "app"]
    )]
    pub load: Vec<PathBuf>,

    /// Service name, used as the unit file name
    #[arg(long, required_unless_present = "load")]
    pub name: Option<String>,

    /// Launcher template
    #[arg(long, default_value_t = TemplateKind::StandardPython)]
    pub template: TemplateKind,

    /// Unit description [default: "Python service <name>"]
    #[arg(long)]
    pub description: Option<String>,

    /// Working directory of the service
    #[arg(long, value_name = "DIR", required_unless_present = "load")]
    pub working_dir: Option<PathBuf>,

    /// Virtual environment containing bin/python
    #[arg(long, value_name = "DIR", required_unless_present = "load")]
    pub venv: Option<PathBuf>,

    /// Python script to run (standard_python)
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Arguments for the script, split like a shell would
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub script_args: Option<String>,

    /// host:port for Gunicorn to bind (gunicorn)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// WSGI application as module:callable (gunicorn)
    #[arg(long, value_name = "MODULE")]
    pub app: Option<String>,

    /// Account to run as [default: the invoking user]
    #[arg(long)]
    pub user: Option<String>,

    /// Group to run as [default: the user's primary group]
    #[arg(long)]
    pub group: Option<String>,

    /// systemd Restart= policy
    #[arg(long, default_value = "always")]
    pub restart: String,

    /// Seconds systemd waits before restarting
    #[arg(long, default_value_t = DEFAULT_RESTART_SEC)]
    pub restart_sec: u32,

    /// Environment assignments, e.g. --env "DEBUG=0 LOG_DIR='/var/log/app'"
    #[arg(long = "env", value_name = "ASSIGNMENTS")]
    pub env: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub definition: DefinitionArgs,

    /// Write the unit file and reload systemd
    #[arg(long)]
    pub deploy: bool,

    /// Enable the unit (implies --deploy)
    #[arg(long)]
    pub enable: bool,

    /// Start the unit (implies --deploy)
    #[arg(long)]
    pub start: bool,
}

fn shell_split(field: &str, value: &str) -> ServiceResult<Vec<String>> {
    shlex::split(value).ok_or_else(|| {
        ServiceError::invalid(FieldError::InvalidParameter {
            field: field.to_string(),
            message: "unbalanced quotes".to_string(),
        })
    })
}

/// Name of the user who invoked the command, looking through sudo.
pub(crate) fn invoking_user() -> Option<String> {
    if let Ok(name) = std::env::var("SUDO_USER") {
        if !name.is_empty() {
            return Some(name);
        }
    }
    User::from_uid(getuid()).ok().flatten().map(|user| user.name)
}

impl DefinitionArgs {
    /// Build the definitions these flags describe.
    ///
    /// With `--load`, each file is read as a saved record. Otherwise one
    /// definition is assembled from the flags; `user` fills in the account
    /// when `--user` is absent.
    pub fn definitions(&self, user: Option<String>) -> ServiceResult<Vec<ServiceDefinition>> {
        if !self.load.is_empty() {
            return self
                .load
                .iter()
                .map(|path| DefinitionStore::load_from_path(path))
                .collect();
        }
        self.build_from_flags(user).map(|def| vec![def])
    }

    fn build_from_flags(&self, user: Option<String>) -> ServiceResult<ServiceDefinition> {
        let name = self.name.clone().unwrap_or_default();

        let template = match self.template {
            TemplateKind::StandardPython => ServiceTemplate::StandardPython {
                script_path: self.script.clone(),
                script_args: match &self.script_args {
                    Some(args) => shell_split("script_args", args)?,
                    None => Vec::new(),
                },
            },
            TemplateKind::Gunicorn => ServiceTemplate::Gunicorn {
                bind_address: self.bind.clone(),
                app_module: self.app.clone(),
            },
        };

        let mut assignments = Vec::new();
        for value in &self.env {
            assignments.extend(shell_split("environment", value)?);
        }
        let environment = Environment::from_assignments(assignments).map_err(|token| {
            ServiceError::invalid(FieldError::InvalidParameter {
                field: "environment".to_string(),
                message: format!("expected NAME=value, got '{}'", token),
            })
        })?;

        let mut def = ServiceDefinition::new(
            name,
            template,
            self.working_dir.clone().unwrap_or_default(),
            self.venv.clone().unwrap_or_default(),
        );
        if let Some(description) = &self.description {
            def.description = description.clone();
        }
        def.user = self.user.clone().or(user);
        def.group = self.group.clone();
        def.restart_policy = self.restart.clone();
        def.restart_sec = self.restart_sec;
        def.environment = environment;
        Ok(def)
    }
}
