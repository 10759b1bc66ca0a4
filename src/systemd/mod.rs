//! Init-system integration.
//!
//! Places unit files and drives `systemctl`/`journalctl`. Every external
//! call goes through a [`CommandRunner`] and is bounded by a timeout.

mod adapter;
mod runner;
mod state;
pub mod testing;

pub use adapter::{SystemdAdapter, SystemdOptions, UNIT_FILE_MODE};
pub use runner::{CommandRunner, SubprocessRunner};
pub use state::UnitState;
