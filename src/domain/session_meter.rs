use chrono::{DateTime, Utc};

use crate::domain::session_log::RawSessionRecord;

/// Charger state ids below this value mean no vehicle session is in progress.
pub const SESSION_ACTIVE_STATE_ID: i64 = 9;
/// A tick only counts as charging time when at least this many amps were requested.
pub const MIN_CHARGING_AMPS: f64 = 2.0;

const SECONDS_PER_DAY: i64 = 86_400;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub charger_state_id: i64,
    pub voltage: f64,
    pub vehicle_current: f64,
    pub amps_requested: f64,
}

/// Integrates live charger readings into the cumulative counters written to the
/// session log.
#[derive(Debug, Clone)]
pub struct SessionMeter {
    session_started_at: i64,
    joules: f64,
    seconds_charged: f64,
    last_tick: Option<DateTime<Utc>>,
}

impl SessionMeter {
    /// A meter started at `now`, so a vehicle already connected at startup is
    /// accounted from that moment.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_started_at: now.timestamp(),
            joules: 0.0,
            seconds_charged: 0.0,
            last_tick: None,
        }
    }

    /// Feeds one reading. Returns the log row to persist when the wall-clock minute
    /// rolled over since the previous tick.
    pub fn observe<C: Clock>(
        &mut self,
        reading: &MeterReading,
        clock: &C,
    ) -> Option<RawSessionRecord> {
        let now = clock.now();
        let previous = self.last_tick.replace(now);

        if reading.charger_state_id < SESSION_ACTIVE_STATE_ID {
            self.reset(now);
            return None;
        }

        let previous = previous?;
        let elapsed_seconds = (now - previous).num_milliseconds() as f64 / 1000.0;
        if elapsed_seconds <= 0.0 {
            tracing::warn!(
                previous = %previous,
                now = %now,
                "clock did not advance between meter ticks"
            );
            return None;
        }

        // 1 J = 1 V * 1 A * 1 s
        self.joules += (reading.voltage * reading.vehicle_current * elapsed_seconds).trunc();
        if reading.amps_requested >= MIN_CHARGING_AMPS {
            self.seconds_charged += elapsed_seconds;
        }

        let minute_changed = now.timestamp().div_euclid(60) != previous.timestamp().div_euclid(60);
        minute_changed.then(|| self.log_row(now))
    }

    pub fn session_started_at(&self) -> i64 {
        self.session_started_at
    }

    pub fn joules(&self) -> f64 {
        self.joules
    }

    pub fn seconds_charged(&self) -> f64 {
        self.seconds_charged
    }

    fn reset(&mut self, now: DateTime<Utc>) {
        self.session_started_at = now.timestamp();
        self.joules = 0.0;
        self.seconds_charged = 0.0;
    }

    fn log_row(&self, now: DateTime<Utc>) -> RawSessionRecord {
        let now_seconds = now.timestamp();
        RawSessionRecord {
            first_timestamp: self.session_started_at,
            day_timestamp: now_seconds - now_seconds.rem_euclid(SECONDS_PER_DAY),
            last_timestamp: now_seconds,
            joules: self.joules,
            seconds_charged: self.seconds_charged,
        }
    }
}
