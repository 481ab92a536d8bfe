use tracing_subscriber::{EnvFilter, fmt};

use crate::app::AppError;

/// Installs the global subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Output goes to stderr so the report CLI can stream CSV/JSON on stdout.
pub fn init(default_directive: &str) -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(AppError::logging_init)
}
