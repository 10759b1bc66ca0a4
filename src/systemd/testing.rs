//! Scripted command runner for exercising the adapter without systemd.
//!
//! ```
//! use pysysd::systemd::testing::RecordingRunner;
//! use pysysd::systemd::CommandRunner;
//! use std::time::Duration;
//!
//! let runner = RecordingRunner::new();
//! runner.respond(&["is-active", "svc.service"], 3, "inactive\n", "");
//!
//! let args = vec!["is-active".to_string(), "svc.service".to_string()];
//! let result = runner.run("systemctl", &args, Duration::from_secs(1)).unwrap();
//! assert_eq!(result.stdout, "inactive\n");
//! assert_eq!(runner.calls(), vec![vec!["systemctl", "is-active", "svc.service"]]);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};
use crate::executor::SubprocessResult;

use super::runner::CommandRunner;

#[derive(Debug, Clone)]
enum Reply {
    Exit(SubprocessResult),
    Timeout,
}

/// Records every argument vector and answers from a script.
///
/// Replies are matched on the arguments (without the program). Each
/// argument vector has a queue of replies; the last one repeats. Commands
/// with no script succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    script: Mutex<Vec<(Vec<String>, VecDeque<Reply>)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, args: &[&str], reply: Reply) {
        let key: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let mut script = lock(&self.script);
        match script.iter_mut().find(|(k, _)| *k == key) {
            Some((_, queue)) => queue.push_back(reply),
            None => script.push((key, VecDeque::from([reply]))),
        }
    }

    /// Queue an exit status and output for `args`.
    pub fn respond(&self, args: &[&str], exit_code: i32, stdout: &str, stderr: &str) -> &Self {
        self.push(
            args,
            Reply::Exit(SubprocessResult::exited(exit_code, stdout, stderr)),
        );
        self
    }

    /// Queue a timeout for `args`.
    pub fn respond_timeout(&self, args: &[&str]) -> &Self {
        self.push(args, Reply::Timeout);
        self
    }

    /// Every argument vector run so far, program first.
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls whose arguments equal `args`.
    pub fn count(&self, args: &[&str]) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.len() == args.len() + 1 && call[1..] == *args)
            .count()
    }

    /// Forget recorded calls; the script is kept.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn next_reply(&self, args: &[String]) -> Option<Reply> {
        let mut script = lock(&self.script);
        let (_, queue) = script.iter_mut().find(|(k, _)| k.as_slice() == args)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl CommandRunner for RecordingRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> ServiceResult<SubprocessResult> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        lock(&self.calls).push(call.clone());

        match self.next_reply(args) {
            Some(Reply::Exit(result)) => Ok(result),
            Some(Reply::Timeout) => Err(ServiceError::Timeout {
                command: call.join(" "),
                timeout_secs: timeout.as_secs(),
            }),
            None => Ok(SubprocessResult::exited(0, "", "")),
        }
    }
}
