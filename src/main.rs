//! pysysd - deploy Python programs as systemd services.

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pysysd::cli::{self, Cli};
use pysysd::config::Settings;
use pysysd::error::ServiceError;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing file means defaults
    let settings = match Settings::load_or_default(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = init_logging(&settings, cli.verbose) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    debug!("Starting {} v{}", NAME, VERSION);
    debug!(config = %cli.config.display(), "Configuration loaded");

    match cli::run(cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.code(), "Command failed");
            report_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Print an error for the operator, one line per validation problem.
fn report_error(error: &ServiceError) {
    match error {
        ServiceError::Validation { errors } => {
            eprintln!("error: service definition is invalid");
            for field_error in errors {
                eprintln!("  {}: {}", field_error.field(), field_error);
            }
        }
        _ => eprintln!("error: {}", error),
    }
}

/// Initialize logging based on settings.
///
/// `RUST_LOG` wins over everything; `-v` flags win over the configured
/// level.
fn init_logging(settings: &Settings, verbose: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = match verbose {
        0 => settings.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file = match &settings.logging.file {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };
    let json = settings.logging.format.eq_ignore_ascii_case("json");
    let registry = tracing_subscriber::registry().with(env_filter);

    match (json, file) {
        (true, Some(file)) => registry
            .with(fmt::layer().json().with_writer(Mutex::new(file)))
            .init(),
        (true, None) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        (false, Some(file)) => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init(),
        (false, None) => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}
