//! Service lifecycle orchestration.
//!
//! Drives a definition from validation through rendering and deployment,
//! and controls deployed units. Nothing is cached between calls; every
//! operation re-reads the store and re-queries systemd.

mod manager;
mod report;
mod state;

pub use manager::{BatchResult, LifecycleManager};
pub use report::{CreateOptions, CreateReport, ServiceStatus};
pub use state::LifecycleState;
