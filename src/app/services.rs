use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::DbError;
use crate::domain::session_log::RawSessionRecord;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
}

/// Which stored rows are served: sessions above an energy noise floor, started within
/// the history horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLogFilter {
    pub min_joules: i64,
    pub history_days: i64,
}

impl Default for SessionLogFilter {
    fn default() -> Self {
        Self {
            min_joules: 1_500_000,
            history_days: 180,
        }
    }
}

pub trait SessionQueryHandler {
    fn list_session_rows(&self, now: DateTime<Utc>)
    -> Result<Vec<RawSessionRecord>, ServiceError>;
    fn count_session_rows(&self) -> Result<i64, ServiceError>;
    fn get_schema_version(&self) -> Result<u32, ServiceError>;
}

pub trait SessionCommandHandler {
    fn record_session_row(&self, row: &RawSessionRecord) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SqliteSessionService {
    connection: Arc<Mutex<Connection>>,
    filter: SessionLogFilter,
}

impl SqliteSessionService {
    pub fn new(connection: Arc<Mutex<Connection>>, filter: SessionLogFilter) -> Self {
        Self { connection, filter }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, ServiceError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| ServiceError::DbLockPoisoned)?;
        op(&connection).map_err(ServiceError::from)
    }
}

impl SessionQueryHandler for SqliteSessionService {
    fn list_session_rows(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RawSessionRecord>, ServiceError> {
        let since = now.timestamp() - self.filter.history_days * SECONDS_PER_DAY;
        self.with_connection(|connection| {
            db::list_session_rows(connection, self.filter.min_joules, since)
        })
    }

    fn count_session_rows(&self) -> Result<i64, ServiceError> {
        self.with_connection(db::count_session_rows)
    }

    fn get_schema_version(&self) -> Result<u32, ServiceError> {
        self.with_connection(db::schema_version)
    }
}

impl SessionCommandHandler for SqliteSessionService {
    fn record_session_row(&self, row: &RawSessionRecord) -> Result<(), ServiceError> {
        self.with_connection(|connection| db::upsert_session_row(connection, row))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};

    use super::{SessionCommandHandler, SessionLogFilter, SessionQueryHandler, SqliteSessionService};
    use crate::domain::session_log::RawSessionRecord;
    use crate::test_support::open_test_connection;

    #[test]
    fn serves_only_recent_sizeable_sessions() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let (_dir, connection) = open_test_connection("service-filter.sqlite");
        let service = SqliteSessionService::new(
            Arc::new(Mutex::new(connection)),
            SessionLogFilter::default(),
        );
        let day = 86_400;
        let recent = now.timestamp() - 2 * day;
        let ancient = now.timestamp() - 200 * day;

        for (first, joules) in [(recent, 4_000_000.0), (recent + 60, 1_000.0), (ancient, 9e6)] {
            service
                .record_session_row(&RawSessionRecord {
                    first_timestamp: first,
                    day_timestamp: first - first.rem_euclid(day),
                    last_timestamp: first + 600,
                    joules,
                    seconds_charged: 600.0,
                })
                .expect("write should succeed");
        }

        let rows = service.list_session_rows(now).expect("list should succeed");

        assert_eq!(service.count_session_rows().expect("count should work"), 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_timestamp, recent);
        assert_eq!(service.get_schema_version().expect("version should load"), 1);
    }
}
