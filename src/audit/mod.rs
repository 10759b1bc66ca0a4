//! Audit logging module.
//!
//! Records every mutating lifecycle operation as one JSON object per line,
//! so a host's service history can be reconstructed from a single file.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditResult};
pub use logger::AuditLogger;
