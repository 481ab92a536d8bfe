use std::path::PathBuf;

use rusqlite::Connection;
use tempfile::TempDir;

use crate::adapters::db::{open_connection, run_migrations};

/// Path to a sqlite file inside a fresh temp dir; the dir is removed when the returned
/// handle drops.
pub fn temp_db_path(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join(name);
    (dir, path)
}

/// Migrated connection to a temp database. Keep the `TempDir` alive for as long as the
/// connection is used.
pub fn open_test_connection(name: &str) -> (TempDir, Connection) {
    let (dir, path) = temp_db_path(name);
    let mut connection =
        open_connection(path.to_string_lossy().as_ref()).expect("test db should open");
    run_migrations(&mut connection).expect("test db migrations should succeed");
    (dir, connection)
}
