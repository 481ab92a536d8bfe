use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::aggregation::{AttributionPolicy, ChartSeries, aggregate, last_n};
use crate::domain::calendar::{Granularity, utc_from_epoch};
use crate::domain::session_log::{
    EnergySlice, RawSessionRecord, ReconstructedSession, Reconstruction, reconstruct_sessions,
    round_one_decimal,
};

pub const DAILY_WINDOW: usize = 7;
pub const WEEKLY_WINDOW: usize = 4;
pub const MONTHLY_WINDOW: usize = 4;

pub const CSV_HEADER: [&str; 6] = [
    "From",
    "To",
    "Connected Duration (Minutes)",
    "Power Delivered (kWh)",
    "Charging Duration (Minutes)",
    "Average Power (kW)",
];

const TABLE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyCharts {
    pub daily: ChartSeries,
    pub weekly: ChartSeries,
    pub monthly: ChartSeries,
}

/// A reconstructed session with the fields the session table displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTableRow {
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub timestamp: String,
    pub duration: i64,
    pub kwh: String,
    pub minutes_charged: i64,
    pub average_power_kw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub sessions: Vec<ReconstructedSession>,
    pub charts: EnergyCharts,
}

impl SessionReport {
    pub fn table_rows(&self) -> Vec<SessionTableRow> {
        self.sessions.iter().map(table_row).collect()
    }

    pub fn to_csv(&self) -> String {
        sessions_csv(&self.sessions)
    }
}

/// Turns a fetched session log into the session table and the energy charts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAggregator {
    policy: AttributionPolicy,
}

impl SessionAggregator {
    pub fn new(policy: AttributionPolicy) -> Self {
        Self { policy }
    }

    pub fn build(&self, rows: Vec<RawSessionRecord>, now: DateTime<Utc>) -> SessionReport {
        let row_count = rows.len();
        let Reconstruction {
            sessions,
            slices,
            regressions,
        } = reconstruct_sessions(rows);

        let charts = EnergyCharts {
            daily: self.window(&slices, Granularity::Daily, DAILY_WINDOW, now),
            weekly: self.window(&slices, Granularity::Weekly, WEEKLY_WINDOW, now),
            monthly: self.window(&slices, Granularity::Monthly, MONTHLY_WINDOW, now),
        };

        tracing::debug!(
            rows = row_count,
            sessions = sessions.len(),
            counter_regressions = regressions.len(),
            policy = ?self.policy,
            "session report built"
        );

        SessionReport { sessions, charts }
    }

    fn window(
        &self,
        slices: &[EnergySlice],
        granularity: Granularity,
        count: usize,
        now: DateTime<Utc>,
    ) -> ChartSeries {
        let totals = aggregate(slices, granularity, self.policy);
        last_n(&totals, count, granularity, now)
    }
}

pub fn table_row(session: &ReconstructedSession) -> SessionTableRow {
    SessionTableRow {
        first_timestamp: session.first_timestamp,
        last_timestamp: session.last_timestamp,
        timestamp: format_epoch(session.first_timestamp, TABLE_TIME_FORMAT),
        duration: session.duration_minutes.round() as i64,
        kwh: format!("{} kWh", round_one_decimal(session.kwh())),
        minutes_charged: session.minutes_charged.round() as i64,
        average_power_kw: session.average_power_kw,
    }
}

/// CSV export of the session table, header first, one line per session.
pub fn sessions_csv(sessions: &[ReconstructedSession]) -> String {
    let mut lines = Vec::with_capacity(sessions.len() + 1);
    lines.push(CSV_HEADER.join(","));

    for session in sessions {
        let average_power = session
            .average_power_kw
            .map(|value| value.to_string())
            .unwrap_or_default();

        lines.push(
            [
                format_epoch(session.first_timestamp, CSV_TIME_FORMAT),
                format_epoch(session.last_timestamp, CSV_TIME_FORMAT),
                round_one_decimal(session.duration_minutes).to_string(),
                round_one_decimal(session.kwh()).to_string(),
                round_one_decimal(session.minutes_charged).to_string(),
                average_power,
            ]
            .join(","),
        );
    }

    lines.join("\n")
}

fn format_epoch(seconds: i64, format: &str) -> String {
    utc_from_epoch(seconds)
        .map(|instant| instant.format(format).to_string())
        .unwrap_or_default()
}
