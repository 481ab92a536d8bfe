use rusqlite::{Connection, params};
use thiserror::Error;

use crate::domain::session_log::RawSessionRecord;

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS session_log (
    first_timestamp INTEGER NOT NULL,
    day_timestamp INTEGER NOT NULL,
    last_timestamp INTEGER,
    joules INTEGER NOT NULL,
    seconds_charged INTEGER NOT NULL,
    PRIMARY KEY (first_timestamp, day_timestamp)
);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    let connection = Connection::open(path)?;
    let _mode: String =
        connection.pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))?;
    Ok(connection)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Writes the latest cumulative totals for one (session, day) row, replacing any
/// earlier write for the same key.
pub fn upsert_session_row(connection: &Connection, row: &RawSessionRecord) -> Result<(), DbError> {
    connection.execute(
        "REPLACE INTO session_log (first_timestamp, last_timestamp, day_timestamp, joules, seconds_charged)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.first_timestamp,
            row.last_timestamp,
            row.day_timestamp,
            row.joules.trunc() as i64,
            row.seconds_charged.trunc() as i64,
        ],
    )?;

    Ok(())
}

/// Rows of sessions started after `since` whose energy exceeds `min_joules`.
pub fn list_session_rows(
    connection: &Connection,
    min_joules: i64,
    since: i64,
) -> Result<Vec<RawSessionRecord>, DbError> {
    let mut statement = connection.prepare(
        "SELECT first_timestamp, last_timestamp, day_timestamp, joules, seconds_charged
         FROM session_log
         WHERE joules > ?1 AND first_timestamp > ?2
         ORDER BY first_timestamp, day_timestamp",
    )?;

    let rows = statement.query_map(params![min_joules, since], |row| {
        Ok(RawSessionRecord {
            first_timestamp: row.get(0)?,
            last_timestamp: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
            day_timestamp: row.get(2)?,
            joules: row.get::<_, i64>(3)? as f64,
            seconds_charged: row.get::<_, i64>(4)? as f64,
        })
    })?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }

    Ok(sessions)
}

pub fn count_session_rows(connection: &Connection) -> Result<i64, DbError> {
    let count = connection.query_row("SELECT COUNT(*) FROM session_log", [], |row| row.get(0))?;
    Ok(count)
}
