use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::adapters::device::{DeviceClient, DeviceClientError};
use crate::app::services::{ServiceError, SessionCommandHandler};
use crate::domain::session_meter::{Clock, SessionMeter};
use crate::domain::status_payload::{ParseError, parse_status};

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to fetch charger status: {0}")]
    FetchStatus(#[source] DeviceClientError),
    #[error("failed to parse charger status: {0}")]
    ParseStatus(#[source] ParseError),
    #[error("failed to persist session log row: {0}")]
    Persist(#[source] ServiceError),
}

/// Polls the charger status and keeps the session log up to date.
pub struct SessionRecorder<D, Cl, S> {
    device: D,
    clock: Cl,
    store: S,
    meter: SessionMeter,
}

impl<D, Cl, S> SessionRecorder<D, Cl, S>
where
    D: DeviceClient,
    Cl: Clock,
    S: SessionCommandHandler,
{
    pub fn new(device: D, clock: Cl, store: S) -> Self {
        let meter = SessionMeter::new(clock.now());
        Self {
            device,
            clock,
            store,
            meter,
        }
    }

    pub fn tick(&mut self) -> Result<(), RecorderError> {
        let status = self
            .device
            .get_status()
            .map_err(RecorderError::FetchStatus)?;
        let reading = parse_status(&status).map_err(RecorderError::ParseStatus)?;

        let Some(row) = self.meter.observe(&reading, &self.clock) else {
            return Ok(());
        };

        self.store
            .record_session_row(&row)
            .map_err(RecorderError::Persist)?;

        tracing::info!(
            first_timestamp = row.first_timestamp,
            day_timestamp = row.day_timestamp,
            last_timestamp = row.last_timestamp,
            joules = row.joules,
            seconds_charged = row.seconds_charged,
            "session log row persisted"
        );

        Ok(())
    }
}

pub fn start_recorder<D, Cl, S>(
    mut recorder: SessionRecorder<D, Cl, S>,
    poll_interval: Duration,
    stop_flag: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    D: DeviceClient,
    Cl: Clock + Send + 'static,
    S: SessionCommandHandler + Send + 'static,
{
    std::thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            if let Err(error) = recorder.tick() {
                tracing::warn!(error = %error, "recorder cycle failed");
            }
            std::thread::sleep(poll_interval);
        }
    })
}
