//! Unit file rendering.
//!
//! Turns a [`ServiceDefinition`](crate::definition::ServiceDefinition) into
//! systemd unit text using Tera templates, one per launcher kind.

mod engine;
mod escape;

pub use engine::TemplateEngine;
pub use escape::{environment_assignment, escape_specifiers, exec_command_line, quote_exec_token};
