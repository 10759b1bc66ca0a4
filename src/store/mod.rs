//! Persistence of service definitions.
//!
//! One pretty-printed JSON record per service, named `<name>.json`.

mod definitions;

pub use definitions::{DefinitionStore, DefinitionSummary, RECORD_FILE_MODE};
