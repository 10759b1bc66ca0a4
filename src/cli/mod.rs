//! Command-line front end.
//!
//! Turns flags or saved records into service definitions and maps each
//! subcommand onto one lifecycle operation.

mod args;
mod run;

pub use args::{Cli, Command, CreateArgs, DefinitionArgs};
pub use run::{build_manager, run};
