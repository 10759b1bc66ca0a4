//! Command executor module.
//!
//! Runs external programs without a shell and bounds every call with a
//! timeout.

mod output;
mod subprocess;

pub use output::sanitize_output;
pub use subprocess::{SubprocessBuilder, SubprocessResult};
