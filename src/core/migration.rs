//! Explicit schema bootstrap for the directory store.
//!
//! `migrate` runs once before the service accepts requests (from `serve` and
//! from the `migrate` command). Steps are gated on `meta.schema_version`, so
//! running it against an up-to-date database is a no-op apart from the version read.

use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

/// Outcome of one migration run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub applied: bool,
}

/// Bring the store's schema up to `DIRECTORY_SCHEMA_VERSION`.
pub fn migrate(store: &Store) -> Result<MigrationReport, error::DirectoryError> {
    if let Some(parent) = store.db_path().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                error::DirectoryError::DatabaseInitializationError(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let report = store.with_write(|conn| ensure_schema(conn))?;
    if report.applied {
        tracing::info!(
            from = report.from_version,
            to = report.to_version,
            db = %store.db_path().display(),
            "schema migrated"
        );
    } else {
        tracing::debug!(version = report.to_version, "schema up to date");
    }
    Ok(report)
}

fn ensure_schema(conn: &Connection) -> Result<MigrationReport, error::DirectoryError> {
    conn.execute(schemas::DIRECTORY_DB_SCHEMA_META, [])?;

    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(error::DirectoryError::RusqliteError)?;

    let current_version: u32 = current
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);

    if current_version >= schemas::DIRECTORY_SCHEMA_VERSION {
        return Ok(MigrationReport {
            from_version: current_version,
            to_version: current_version,
            applied: false,
        });
    }

    if current_version < 1 {
        conn.execute(schemas::DIRECTORY_DB_SCHEMA_USERS, [])?;
        conn.execute(schemas::DIRECTORY_DB_SCHEMA_GROUPS, [])?;
        conn.execute(schemas::DIRECTORY_DB_SCHEMA_MEMBERSHIPS, [])?;
        conn.execute(schemas::DIRECTORY_DB_SCHEMA_INDEX_MEMBERSHIPS_GROUP, [])?;
    }

    // v1 ordered memberships by the implicit rowid; rebuild with an explicit id.
    if current_version == 1 {
        conn.execute_batch(
            "ALTER TABLE memberships RENAME TO memberships_v1;
             DROP INDEX IF EXISTS idx_memberships_group;",
        )?;
        conn.execute(schemas::DIRECTORY_DB_SCHEMA_MEMBERSHIPS, [])?;
        conn.execute_batch(
            "INSERT INTO memberships(userid, group_name)
                 SELECT userid, group_name FROM memberships_v1 ORDER BY rowid;
             DROP TABLE memberships_v1;",
        )?;
        conn.execute(schemas::DIRECTORY_DB_SCHEMA_INDEX_MEMBERSHIPS_GROUP, [])?;
    }

    conn.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [schemas::DIRECTORY_SCHEMA_VERSION.to_string()],
    )?;

    Ok(MigrationReport {
        from_version: current_version,
        to_version: schemas::DIRECTORY_SCHEMA_VERSION,
        applied: true,
    })
}
