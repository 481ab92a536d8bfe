pub mod config;
mod error;
mod logging;
pub mod recorder;
pub mod report;
mod runtime;
pub mod services;

pub use error::AppError;

pub fn run_service() -> Result<(), AppError> {
    logging::init("info")?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        device_url = %config.device_url,
        db_path = %config.db_path,
        http_bind = %config.http_bind,
        poll_interval_ms = config.poll_interval_ms,
        device_timeout_ms = config.device_timeout_ms,
        session_min_joules = config.session_min_joules,
        session_history_days = config.session_history_days,
        attribution = ?config.attribution,
        "application bootstrap initialized"
    );

    runtime::run(config)
}

pub fn run_report() -> Result<(), AppError> {
    logging::init("warn")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match report::parse_args(&args)? {
        report::ReportCommand::Help => {
            report::print_help();
            Ok(())
        }
        report::ReportCommand::Run(args) => report::run(args),
    }
}
