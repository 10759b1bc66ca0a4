//! Input validation module.
//!
//! Provides validators for service names, filesystem paths, Gunicorn
//! settings, account names and whole service definitions.

mod definition;
mod gunicorn;
mod path;
mod service_name;
mod username;

pub use definition::{validate, validate_definition, validate_environment_name};
pub use gunicorn::{validate_app_module, validate_bind_address};
pub use path::{check_directory, check_interpreter, check_python_script};
pub use service_name::{validate_service_name, MAX_SERVICE_NAME_LENGTH};
pub use username::validate_account_name;
