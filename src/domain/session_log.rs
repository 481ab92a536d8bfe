use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::status_payload::parse_f64;

pub const JOULES_PER_KWH: f64 = 3_600_000.0;

/// One row of the charger's session log: a single calendar day's slice of a possibly
/// multi-day charging session.
///
/// `joules` and `seconds_charged` are running totals since `first_timestamp`, they are
/// not reset when a new day row is started. Missing or non-numeric fields read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSessionRecord {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub first_timestamp: i64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub day_timestamp: i64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_timestamp: i64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub joules: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub seconds_charged: f64,
}

impl RawSessionRecord {
    /// Connected minutes covered by this row, clamped to the row's own calendar day.
    ///
    /// Zero when the timestamps are out of order or too far apart to subtract.
    pub fn connected_minutes(&self) -> f64 {
        let covered_from = self.first_timestamp.max(self.day_timestamp);
        self.last_timestamp
            .checked_sub(covered_from)
            .map_or(0.0, |seconds| seconds.max(0) as f64 / 60.0)
    }
}

/// One logical charging session after merging its per-day rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructedSession {
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub joules: f64,
    pub duration_minutes: f64,
    pub minutes_charged: f64,
    pub average_power_kw: Option<f64>,
}

impl ReconstructedSession {
    pub fn kwh(&self) -> f64 {
        self.joules / JOULES_PER_KWH
    }
}

/// Energy delivered inside `[start, end]`, expressed as a per-row delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergySlice {
    pub start: i64,
    pub end: i64,
    pub joules: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Joules,
    SecondsCharged,
}

/// A cumulative counter that went backwards between two rows of the same session.
/// The row's delta is clamped to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterRegression {
    pub first_timestamp: i64,
    pub day_timestamp: i64,
    pub counter: CounterKind,
    pub previous: f64,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconstruction {
    /// Most recent session first.
    pub sessions: Vec<ReconstructedSession>,
    pub slices: Vec<EnergySlice>,
    pub regressions: Vec<CounterRegression>,
}

/// Collapses raw per-day log rows into one row per logical session and corrects the
/// cumulative counters into per-row deltas.
pub fn reconstruct_sessions(mut rows: Vec<RawSessionRecord>) -> Reconstruction {
    rows.sort_by(|left, right| {
        right
            .first_timestamp
            .cmp(&left.first_timestamp)
            .then(left.day_timestamp.cmp(&right.day_timestamp))
            .then(left.last_timestamp.cmp(&right.last_timestamp))
    });

    rows.into_iter()
        .fold(MergeAccumulator::default(), MergeAccumulator::push)
        .finish()
}

/// Decodes a `/getsessiondata` payload element by element; rows that are not objects
/// are skipped rather than failing the whole batch.
pub fn decode_session_rows(payload: &Value) -> Vec<RawSessionRecord> {
    let Some(items) = payload.as_array() else {
        tracing::warn!("session log payload is not an array");
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            match RawSessionRecord::deserialize(item) {
                Ok(row) => Some(row),
                Err(error) => {
                    tracing::warn!(index, error = %error, "skipping malformed session log row");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    first_timestamp: i64,
    joules: f64,
    seconds_charged: f64,
}

#[derive(Debug, Default)]
struct MergeAccumulator {
    sessions: Vec<ReconstructedSession>,
    slices: Vec<EnergySlice>,
    regressions: Vec<CounterRegression>,
    baseline: Option<Baseline>,
}

impl MergeAccumulator {
    fn push(mut self, row: RawSessionRecord) -> Self {
        let joules = finite_or_zero(row.joules);
        let seconds_charged = finite_or_zero(row.seconds_charged);

        match self.baseline {
            Some(baseline) if baseline.first_timestamp == row.first_timestamp => {
                let joules_delta =
                    self.delta(&row, CounterKind::Joules, baseline.joules, joules);
                let seconds_delta = self.delta(
                    &row,
                    CounterKind::SecondsCharged,
                    baseline.seconds_charged,
                    seconds_charged,
                );

                if let Some(session) = self.sessions.last_mut() {
                    session.last_timestamp = row.last_timestamp;
                    session.joules = joules;
                    session.duration_minutes += row.connected_minutes();
                    session.minutes_charged += seconds_delta / 60.0;
                }

                self.slices.push(EnergySlice {
                    start: row.day_timestamp,
                    end: row.last_timestamp,
                    joules: joules_delta,
                });
            }
            _ => {
                self.sessions.push(ReconstructedSession {
                    first_timestamp: row.first_timestamp,
                    last_timestamp: row.last_timestamp,
                    joules,
                    duration_minutes: row.connected_minutes(),
                    minutes_charged: seconds_charged.max(0.0) / 60.0,
                    average_power_kw: None,
                });

                self.slices.push(EnergySlice {
                    start: row.first_timestamp,
                    end: row.last_timestamp,
                    joules: joules.max(0.0),
                });
            }
        }

        self.baseline = Some(Baseline {
            first_timestamp: row.first_timestamp,
            joules,
            seconds_charged,
        });

        self
    }

    fn delta(
        &mut self,
        row: &RawSessionRecord,
        counter: CounterKind,
        previous: f64,
        current: f64,
    ) -> f64 {
        if current >= previous {
            return current - previous;
        }

        tracing::warn!(
            first_timestamp = row.first_timestamp,
            day_timestamp = row.day_timestamp,
            ?counter,
            previous,
            current,
            "session log counter moved backwards"
        );
        self.regressions.push(CounterRegression {
            first_timestamp: row.first_timestamp,
            day_timestamp: row.day_timestamp,
            counter,
            previous,
            current,
        });
        0.0
    }

    fn finish(self) -> Reconstruction {
        let sessions = self
            .sessions
            .into_iter()
            .filter(|session| session.last_timestamp > session.first_timestamp)
            .map(|mut session| {
                session.average_power_kw = average_power_kw(session.kwh(), session.minutes_charged);
                session
            })
            .collect();

        Reconstruction {
            sessions,
            slices: self.slices,
            regressions: self.regressions,
        }
    }
}

/// Mean charging power rounded to one decimal, `None` when nothing was charged.
pub fn average_power_kw(kwh: f64, minutes_charged: f64) -> Option<f64> {
    if minutes_charged <= 0.0 || !minutes_charged.is_finite() {
        return None;
    }

    Some(round_one_decimal(kwh / (minutes_charged / 60.0)))
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_f64).unwrap_or(0.0))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer).map(|value| value.trunc() as i64)
}
