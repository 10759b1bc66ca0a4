//! External process invocation seam.

use std::time::Duration;

use crate::error::ServiceResult;
use crate::executor::{SubprocessBuilder, SubprocessResult};

/// Runs one external program to completion.
///
/// A non-zero exit is reported through [`SubprocessResult`]; only failure
/// to run or a timeout is an error.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> ServiceResult<SubprocessResult>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessRunner;

impl CommandRunner for SubprocessRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> ServiceResult<SubprocessResult> {
        // Untranslated output so `is-active` and friends can be parsed
        SubprocessBuilder::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .env("SYSTEMD_COLORS", "0")
            .timeout(timeout)
            .run()
    }
}
