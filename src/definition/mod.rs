//! Service definition data model.
//!
//! A [`ServiceDefinition`] is the declarative description of one Python
//! process. It is what the store persists, the validator checks and the
//! template engine renders.

mod environment;
mod types;

pub use environment::Environment;
pub use types::{
    interpreter_path, RestartPolicy, ServiceDefinition, ServiceTemplate, TemplateKind,
    DEFAULT_RESTART_SEC,
};
