//! Configuration settings for pysysd.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ServiceError;
use crate::systemd::SystemdOptions;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pysysd/config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub systemd: SystemdConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Paths configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory unit files are written to.
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    /// Directory holding one JSON record per service definition.
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,
    /// Directory of `<kind>.service.tera` files replacing built-in templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

/// `systemctl`/`journalctl` invocation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemdConfig {
    #[serde(default = "default_systemctl")]
    pub systemctl: String,
    #[serde(default = "default_journalctl")]
    pub journalctl: String,
    /// Timeout for start/stop/enable/daemon-reload and friends, in seconds.
    #[serde(default = "default_control_timeout")]
    pub control_timeout_seconds: u64,
    /// Timeout for status queries, in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
    /// Pause before retrying a failed daemon-reload, in milliseconds.
    #[serde(default = "default_reload_retry_delay")]
    pub reload_retry_delay_ms: u64,
    /// Journal lines attached to start/restart failures.
    #[serde(default = "default_journal_lines")]
    pub journal_lines: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Optional log file path; stderr when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

fn default_definitions_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("pysysd")
        .join("services")
}

fn default_systemctl() -> String {
    "systemctl".to_string()
}

fn default_journalctl() -> String {
    "journalctl".to_string()
}

fn default_control_timeout() -> u64 {
    120
}

fn default_query_timeout() -> u64 {
    30
}

fn default_reload_retry_delay() -> u64 {
    2000
}

fn default_journal_lines() -> usize {
    20
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/pysysd/audit.log")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            unit_dir: default_unit_dir(),
            definitions_dir: default_definitions_dir(),
            templates_dir: None,
        }
    }
}

impl Default for SystemdConfig {
    fn default() -> Self {
        Self {
            systemctl: default_systemctl(),
            journalctl: default_journalctl(),
            control_timeout_seconds: default_control_timeout(),
            query_timeout_seconds: default_query_timeout(),
            reload_retry_delay_ms: default_reload_retry_delay(),
            journal_lines: default_journal_lines(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl SystemdConfig {
    /// Adapter options described by this section.
    pub fn adapter_options(&self) -> SystemdOptions {
        SystemdOptions {
            systemctl: self.systemctl.clone(),
            journalctl: self.journalctl.clone(),
            control_timeout: Duration::from_secs(self.control_timeout_seconds),
            query_timeout: Duration::from_secs(self.query_timeout_seconds),
            reload_retry_delay: Duration::from_millis(self.reload_retry_delay_ms),
            journal_lines: self.journal_lines,
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ServiceError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ServiceError::Config { message } => ServiceError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Load settings, using the defaults when `path` does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, ServiceError> {
        let settings: Settings = toml::from_str(content).map_err(|e| ServiceError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), ServiceError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ServiceError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ServiceError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.systemd.control_timeout_seconds == 0 || self.systemd.query_timeout_seconds == 0 {
            return Err(ServiceError::Config {
                message: "systemd timeouts must be greater than zero".to_string(),
            });
        }

        for (key, dir) in [
            ("paths.unit_dir", &self.paths.unit_dir),
            ("paths.definitions_dir", &self.paths.definitions_dir),
        ] {
            if !dir.is_absolute() {
                return Err(ServiceError::Config {
                    message: format!("{} must be an absolute path, got '{}'", key, dir.display()),
                });
            }
        }

        Ok(())
    }
}
