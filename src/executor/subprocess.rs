//! Safe subprocess execution.
//!
//! Provides utilities for running external commands safely with:
//! - No shell interpretation (direct exec)
//! - Configurable timeouts
//! - Captured stdout/stderr

use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

/// Least time allowed for collecting output after the process exits.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Result of a subprocess execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubprocessResult {
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
    /// The exit code, if available.
    pub exit_code: Option<i32>,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl SubprocessResult {
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// A finished command with the given exit code and output.
    pub fn exited(code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            success: code == 0,
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }
}

/// Builder for subprocess execution.
pub struct SubprocessBuilder {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl SubprocessBuilder {
    /// Create a new subprocess builder.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Add arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Set the timeout for the command.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line as it would be typed, for messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute the command and wait for completion with timeout enforcement.
    ///
    /// Output is drained on reader threads while the child runs, so a
    /// chatty command cannot stall on a full pipe. If the process exceeds
    /// the configured timeout it is killed and [`ServiceError::Timeout`] is
    /// returned. A non-zero exit is not an error here; callers inspect
    /// [`SubprocessResult::success`].
    pub fn run(self) -> ServiceResult<SubprocessResult> {
        let command_line = self.command_line();
        debug!(
            program = %self.program,
            args = ?self.args,
            timeout_secs = self.timeout.as_secs(),
            "Executing subprocess"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| ServiceError::Spawn {
            command: command_line.clone(),
            message: e.to_string(),
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // Poll for completion with timeout enforcement
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    // A background grandchild may keep the pipes open; never
                    // wait on them past the deadline.
                    let remaining = self
                        .timeout
                        .saturating_sub(start.elapsed())
                        .max(OUTPUT_GRACE);
                    let output = Output {
                        status,
                        stdout: stdout.recv_timeout(remaining).unwrap_or_default(),
                        stderr: stderr.recv_timeout(remaining).unwrap_or_default(),
                    };
                    let result = SubprocessResult::from_output(output);
                    debug!(
                        success = result.success,
                        exit_code = ?result.exit_code,
                        duration_ms = start.elapsed().as_millis(),
                        "Subprocess completed"
                    );
                    return Ok(result);
                }
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        warn!(
                            command = %command_line,
                            timeout_secs = self.timeout.as_secs(),
                            "Process timed out, killing"
                        );
                        if let Err(e) = child.kill() {
                            warn!(error = %e, "Failed to kill timed-out process");
                        }
                        // Reap the zombie process
                        let _ = child.wait();
                        return Err(ServiceError::Timeout {
                            command: command_line,
                            timeout_secs: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(poll_interval);
                }
                Err(e) => {
                    return Err(ServiceError::Spawn {
                        command: command_line,
                        message: format!("failed to check process status: {}", e),
                    });
                }
            }
        }
    }
}

/// Read `pipe` to the end on its own thread.
///
/// The receiver yields the bytes once the pipe closes. A missing pipe
/// yields an empty buffer.
fn drain<P: Read + Send + 'static>(pipe: Option<P>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buffer) {
                debug!(error = %e, "Failed to read subprocess output");
            }
        }
        // Ignore send errors (receiver may have dropped on timeout)
        let _ = tx.send(buffer);
    });
    rx
}
