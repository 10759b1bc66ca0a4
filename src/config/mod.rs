//! Configuration module for pysysd.
//!
//! Handles loading and validating settings from a TOML file. Every key has
//! a default, so a missing file is equivalent to an empty one.

mod settings;

pub use settings::*;
