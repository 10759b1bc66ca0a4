//! pysysd library.
//!
//! Validates declarative descriptions of Python services, renders them into
//! systemd units and drives those units through deploy, start, stop and
//! removal.

mod atomic;

pub mod audit;
pub mod cli;
pub mod config;
pub mod definition;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod store;
pub mod systemd;
pub mod templates;
pub mod validation;
