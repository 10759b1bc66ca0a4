//! Unit file placement and `systemctl` control.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::error::{ServiceError, ServiceResult};
use crate::executor::{sanitize_output, SubprocessResult};
use crate::validation::validate_service_name;

use super::runner::{CommandRunner, SubprocessRunner};
use super::state::UnitState;

/// Permissions of written unit files.
pub const UNIT_FILE_MODE: u32 = 0o644;

/// Lines of captured stderr kept in error diagnostics.
const DIAGNOSTIC_LINES: usize = 20;

/// Programs and limits used when talking to systemd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemdOptions {
    pub systemctl: String,
    pub journalctl: String,
    /// Limit for commands that change unit state.
    pub control_timeout: Duration,
    /// Limit for read-only queries.
    pub query_timeout: Duration,
    /// Pause before the single `daemon-reload` retry.
    pub reload_retry_delay: Duration,
    /// Journal lines attached to start/restart failures.
    pub journal_lines: usize,
}

impl Default for SystemdOptions {
    fn default() -> Self {
        Self {
            systemctl: "systemctl".to_string(),
            journalctl: "journalctl".to_string(),
            control_timeout: Duration::from_secs(120),
            query_timeout: Duration::from_secs(30),
            reload_retry_delay: Duration::from_secs(2),
            journal_lines: 20,
        }
    }
}

/// Wraps every interaction with the init system for one unit directory.
pub struct SystemdAdapter<R = SubprocessRunner> {
    unit_dir: PathBuf,
    runner: R,
    options: SystemdOptions,
}

impl SystemdAdapter<SubprocessRunner> {
    /// Adapter running the real `systemctl` with default options.
    pub fn new(unit_dir: impl Into<PathBuf>) -> Self {
        Self::with_runner(unit_dir, SubprocessRunner, SystemdOptions::default())
    }
}

impl<R: CommandRunner> SystemdAdapter<R> {
    pub fn with_runner(unit_dir: impl Into<PathBuf>, runner: R, options: SystemdOptions) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            runner,
            options,
        }
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn options(&self) -> &SystemdOptions {
        &self.options
    }

    /// `<name>.service`.
    pub fn unit_name(name: &str) -> String {
        format!("{}.service", name)
    }

    /// `<unit_dir>/<name>.service`.
    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(Self::unit_name(name))
    }

    pub fn unit_exists(&self, name: &str) -> bool {
        self.unit_path(name).is_file()
    }

    /// Ensure the effective user may write to the unit directory.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PermissionDenied`] when the directory is not
    /// writable, [`ServiceError::Path`] when it does not exist.
    pub fn check_privileges(&self) -> ServiceResult<()> {
        match access(&self.unit_dir, AccessFlags::W_OK) {
            Ok(()) => Ok(()),
            Err(Errno::ENOENT) => Err(ServiceError::Path {
                path: self.unit_dir.clone(),
                message: "unit directory does not exist".to_string(),
            }),
            Err(e) => Err(ServiceError::PermissionDenied {
                message: format!(
                    "cannot write to '{}' ({}); run as root or via sudo",
                    self.unit_dir.display(),
                    e.desc()
                ),
            }),
        }
    }

    /// Atomically place the unit file for `name`.
    ///
    /// # Returns
    ///
    /// The path that was written.
    pub fn write_unit(&self, name: &str, text: &str) -> ServiceResult<PathBuf> {
        validate_service_name(name)?;
        let path = self.unit_path(name);
        write_atomic(&path, text.as_bytes(), UNIT_FILE_MODE)?;
        info!(service = %name, path = %path.display(), "Unit file written");
        Ok(path)
    }

    /// Put back a unit file exactly as it was read.
    pub fn restore_unit(&self, name: &str, bytes: &[u8]) -> ServiceResult<()> {
        validate_service_name(name)?;
        let path = self.unit_path(name);
        write_atomic(&path, bytes, UNIT_FILE_MODE)?;
        info!(service = %name, path = %path.display(), "Unit file restored");
        Ok(())
    }

    /// Remove the unit file for `name`.
    ///
    /// # Returns
    ///
    /// `false` when there was no file to remove.
    pub fn delete_unit_file(&self, name: &str) -> ServiceResult<bool> {
        validate_service_name(name)?;
        let path = self.unit_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(service = %name, path = %path.display(), "Unit file removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServiceError::Write {
                path,
                message: format!("failed to remove unit file: {}", e),
            }),
        }
    }

    fn systemctl(&self, args: &[String], timeout: Duration) -> ServiceResult<SubprocessResult> {
        self.runner.run(&self.options.systemctl, args, timeout)
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.options.systemctl, args.join(" "))
    }

    fn diagnostics(result: &SubprocessResult) -> String {
        let stderr = sanitize_output(&result.stderr, DIAGNOSTIC_LINES);
        if stderr.is_empty() {
            sanitize_output(&result.stdout, DIAGNOSTIC_LINES)
        } else {
            stderr
        }
    }

    /// Reload systemd's unit cache, retrying once on failure.
    pub fn reload_daemon(&self) -> ServiceResult<()> {
        let args = vec!["daemon-reload".to_string()];

        let first = self.systemctl(&args, self.options.control_timeout)?;
        if first.success {
            debug!("systemd daemon reloaded");
            return Ok(());
        }

        warn!(
            exit_code = ?first.exit_code,
            retry_in_ms = self.options.reload_retry_delay.as_millis(),
            "daemon-reload failed, retrying once"
        );
        std::thread::sleep(self.options.reload_retry_delay);

        let second = self.systemctl(&args, self.options.control_timeout)?;
        if second.success {
            debug!("systemd daemon reloaded on retry");
            return Ok(());
        }

        Err(ServiceError::Reload {
            exit_code: second.exit_code,
            diagnostics: Self::diagnostics(&second),
        })
    }

    fn control(&self, verb: &str, name: &str, attach_journal: bool) -> ServiceResult<()> {
        let args = vec![verb.to_string(), Self::unit_name(name)];
        debug!(service = %name, action = verb, "Running systemctl");

        let result = self.systemctl(&args, self.options.control_timeout)?;
        if result.success {
            info!(service = %name, action = verb, "systemctl succeeded");
            return Ok(());
        }

        let mut diagnostics = Self::diagnostics(&result);
        if attach_journal {
            if let Some(journal) = self.journal_excerpt(name) {
                diagnostics.push_str("\n--- journal ---\n");
                diagnostics.push_str(&journal);
            }
        }

        warn!(
            service = %name,
            action = verb,
            exit_code = ?result.exit_code,
            "systemctl failed"
        );
        Err(ServiceError::SystemdCommand {
            command: self.command_line(&args),
            exit_code: result.exit_code,
            diagnostics,
        })
    }

    /// Last journal lines for the unit; `None` if they cannot be read.
    fn journal_excerpt(&self, name: &str) -> Option<String> {
        let args = vec![
            "-u".to_string(),
            Self::unit_name(name),
            "-n".to_string(),
            self.options.journal_lines.to_string(),
            "--no-pager".to_string(),
        ];
        match self
            .runner
            .run(&self.options.journalctl, &args, self.options.query_timeout)
        {
            Ok(result) if result.success => {
                Some(sanitize_output(&result.stdout, self.options.journal_lines))
            }
            Ok(result) => {
                debug!(exit_code = ?result.exit_code, "journalctl returned failure");
                None
            }
            Err(e) => {
                debug!(error = %e, "journalctl could not be run");
                None
            }
        }
    }

    pub fn enable(&self, name: &str) -> ServiceResult<()> {
        self.control("enable", name, false)
    }

    pub fn disable(&self, name: &str) -> ServiceResult<()> {
        self.control("disable", name, false)
    }

    /// Start the unit; failures carry a journal excerpt.
    pub fn start(&self, name: &str) -> ServiceResult<()> {
        self.control("start", name, true)
    }

    pub fn stop(&self, name: &str) -> ServiceResult<()> {
        self.control("stop", name, false)
    }

    /// Restart the unit; failures carry a journal excerpt.
    pub fn restart(&self, name: &str) -> ServiceResult<()> {
        self.control("restart", name, true)
    }

    /// Check that the unit is up after a successful `start`/`restart`.
    ///
    /// `systemctl start` returns as soon as a `Type=simple` unit is forked,
    /// so a script that crashes at once still reports success.
    ///
    /// # Returns
    ///
    /// The observed state; a state systemd reports but this crate does not
    /// know is passed through as [`UnitState::Unknown`].
    ///
    /// # Errors
    ///
    /// [`ServiceError::SystemdCommand`] with a journal excerpt when the unit
    /// is failed, inactive or deactivating.
    pub fn confirm_running(&self, name: &str, action: &str) -> ServiceResult<UnitState> {
        let args = vec!["is-active".to_string(), Self::unit_name(name)];
        let result = self.systemctl(&args, self.options.query_timeout)?;
        let state = UnitState::parse(&result.stdout);

        match state {
            UnitState::Failed | UnitState::Inactive | UnitState::Deactivating => {
                warn!(service = %name, action, state = %state, "Unit did not stay up");
                let mut diagnostics = format!(
                    "{} is {} after {}; see journalctl -u {}",
                    Self::unit_name(name),
                    state,
                    action,
                    Self::unit_name(name)
                );
                if let Some(journal) = self.journal_excerpt(name) {
                    diagnostics.push_str("\n--- journal ---\n");
                    diagnostics.push_str(&journal);
                }
                Err(ServiceError::SystemdCommand {
                    command: self.command_line(&args),
                    exit_code: result.exit_code,
                    diagnostics,
                })
            }
            _ => {
                debug!(service = %name, state = %state, "Unit is up");
                Ok(state)
            }
        }
    }

    /// Observed active state; [`UnitState::Unknown`] without querying
    /// systemd when there is no unit file.
    pub fn status(&self, name: &str) -> ServiceResult<UnitState> {
        if !self.unit_exists(name) {
            return Ok(UnitState::Unknown);
        }

        // is-active exits non-zero for every state but "active"
        let args = vec!["is-active".to_string(), Self::unit_name(name)];
        let result = self.systemctl(&args, self.options.query_timeout)?;
        Ok(UnitState::parse(&result.stdout))
    }

    /// Whether the unit has install symlinks that `disable` would remove.
    ///
    /// `is-enabled` exits 0 for `enabled`, `enabled-runtime`, `alias` and
    /// friends; `static` also exits 0 but has nothing to disable. `linked`
    /// units exit non-zero yet still carry a symlink.
    pub fn is_enabled(&self, name: &str) -> ServiceResult<bool> {
        let args = vec!["is-enabled".to_string(), Self::unit_name(name)];
        let result = self.systemctl(&args, self.options.query_timeout)?;
        let answer = result.stdout.trim();
        Ok(match answer {
            "static" => false,
            "linked" | "linked-runtime" => true,
            _ => result.success,
        })
    }

    /// PID of the unit's main process, if it has one.
    pub fn main_pid(&self, name: &str) -> ServiceResult<Option<u32>> {
        let args = vec![
            "show".to_string(),
            Self::unit_name(name),
            "--property=MainPID".to_string(),
            "--value".to_string(),
        ];
        let result = self.systemctl(&args, self.options.query_timeout)?;
        if !result.success {
            return Ok(None);
        }
        Ok(result
            .stdout
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&pid| pid > 0))
    }

    /// Stop and disable the unit as needed, delete its file and reload.
    pub fn remove(&self, name: &str) -> ServiceResult<()> {
        if self.status(name)?.is_running() {
            self.stop(name)?;
        }
        if self.is_enabled(name)? {
            self.disable(name)?;
        }
        self.delete_unit_file(name)?;
        self.reload_daemon()?;
        info!(service = %name, "Unit removed");
        Ok(())
    }
}
