use std::io::Write;
use std::time::Duration;

use chrono::Utc;

use crate::adapters::device::{DeviceClient, HttpDeviceClient};
use crate::app::AppError;
use crate::app::config::{device_timeout_ms, device_url, load_dotenv, parse_policy};
use crate::domain::aggregation::AttributionPolicy;
use crate::domain::report::SessionAggregator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Csv,
    Chart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportArgs {
    pub format: ReportFormat,
    pub device_url: Option<String>,
    pub policy: AttributionPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportCommand {
    Run(ReportArgs),
    Help,
}

pub fn parse_args(args: &[String]) -> Result<ReportCommand, AppError> {
    let mut parsed = ReportArgs {
        format: ReportFormat::Table,
        device_url: None,
        policy: AttributionPolicy::default(),
    };

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "table" => parsed.format = ReportFormat::Table,
            "csv" => parsed.format = ReportFormat::Csv,
            "chart" => parsed.format = ReportFormat::Chart,
            "--url" => {
                let Some(value) = args.get(index + 1) else {
                    return Err(AppError::config("--url requires a value"));
                };
                parsed.device_url = Some(value.clone());
                index += 1;
            }
            "--policy" => {
                let Some(value) = args.get(index + 1) else {
                    return Err(AppError::config("--policy requires a value"));
                };
                parsed.policy = parse_policy(value)?;
                index += 1;
            }
            "--help" | "-h" => return Ok(ReportCommand::Help),
            other => return Err(AppError::config(format!("unknown argument: {other}"))),
        }
        index += 1;
    }

    Ok(ReportCommand::Run(parsed))
}

pub fn run(args: ReportArgs) -> Result<(), AppError> {
    load_dotenv();
    let lookup = |key: &str| std::env::var(key).ok();

    let base_url = match args.device_url.clone() {
        Some(url) => url,
        None => device_url(&lookup)?,
    };
    let timeout = Duration::from_millis(device_timeout_ms(&lookup)?);
    let device = HttpDeviceClient::new(&base_url, timeout).map_err(AppError::runtime)?;

    let stdout = std::io::stdout();
    render(&device, &args, &mut stdout.lock())
}

/// Fetches the session log and writes the requested view.
pub fn render<D, W>(device: &D, args: &ReportArgs, out: &mut W) -> Result<(), AppError>
where
    D: DeviceClient,
    W: Write,
{
    let rows = device.get_session_data().map_err(AppError::runtime)?;
    tracing::info!(rows = rows.len(), format = ?args.format, "building session report");

    let report = SessionAggregator::new(args.policy).build(rows, Utc::now());

    let text = match args.format {
        ReportFormat::Csv => report.to_csv(),
        ReportFormat::Chart => {
            serde_json::to_string_pretty(&report.charts).map_err(AppError::runtime)?
        }
        ReportFormat::Table => {
            let mut lines = vec![format!(
                "{:<17} {:>10} {:>10} {:>12}",
                "Start", "Minutes", "Energy", "Avg kW"
            )];
            lines.extend(report.table_rows().into_iter().map(|row| {
                format!(
                    "{:<17} {:>10} {:>10} {:>12}",
                    row.timestamp,
                    row.duration,
                    row.kwh,
                    row.average_power_kw
                        .map(|value| value.to_string())
                        .unwrap_or_default()
                )
            }));
            lines.join("\n")
        }
    };

    writeln!(out, "{text}").map_err(AppError::runtime)
}

pub fn print_help() {
    println!("session_report");
    println!();
    println!("Usage:");
    println!("  session_report [table|csv|chart] [--url <device>] [--policy split|start]");
    println!();
    println!("Options:");
    println!("  --url <device>    charger base url (default: DEVICE_URL)");
    println!("  --policy <name>   split energy over buckets (split) or book it on the start bucket (start)");
}
