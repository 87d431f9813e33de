use crate::core::error;
use rusqlite::Connection;
use std::time::Duration;

/// Default busy timeout for connections that do not hold the write lock.
const BUSY_TIMEOUT_SECS: u64 = 5;

pub fn db_connect(db_path: &str) -> Result<Connection, error::DirectoryError> {
    db_connect_with_timeout(db_path, BUSY_TIMEOUT_SECS)
}

pub fn db_connect_with_timeout(
    db_path: &str,
    busy_timeout_secs: u64,
) -> Result<Connection, error::DirectoryError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(busy_timeout_secs))
        .map_err(error::DirectoryError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::DirectoryError::RusqliteError)?;
    // Cascades and dangling-edge rejection depend on this per-connection pragma.
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::DirectoryError::RusqliteError)?;
    Ok(conn)
}
