//! Record store for the directory.
//!
//! A `Store` owns the location of one SQLite database and hands out a scoped
//! transaction per operation:
//! - Writes are serialized through a per-store mutex and run in a `BEGIN IMMEDIATE`
//!   transaction, so validation reads and the mutation they guard see the same state.
//! - Reads run in a deferred transaction on a fresh connection (WAL allows them to
//!   proceed next to a writer) and always observe a committed snapshot.
//!
//! The transaction commits only when the closure returns `Ok`. Any other exit,
//! including `?` on a validation error, drops it and SQLite rolls back.
//!
//! Connections are opened per operation rather than pooled.

use crate::core::db;
use crate::core::error::DirectoryError;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Busy timeout for the connection holding the write lock.
const WRITE_BUSY_TIMEOUT_SECS: u64 = 30;
/// Busy timeout for read connections.
const READ_BUSY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug)]
pub struct Store {
    db_path: PathBuf,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn open(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` inside one immediate transaction; commit on `Ok`, roll back otherwise.
    pub fn with_write<F, R>(&self, f: F) -> Result<R, DirectoryError>
    where
        F: FnOnce(&Connection) -> Result<R, DirectoryError>,
    {
        // The lock guards no data, so a poisoned lock is still usable.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut conn =
            db::db_connect_with_timeout(&self.db_path.to_string_lossy(), WRITE_BUSY_TIMEOUT_SECS)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&*tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` against a consistent read snapshot.
    pub fn with_read<F, R>(&self, f: F) -> Result<R, DirectoryError>
    where
        F: FnOnce(&Connection) -> Result<R, DirectoryError>,
    {
        let mut conn =
            db::db_connect_with_timeout(&self.db_path.to_string_lossy(), READ_BUSY_TIMEOUT_SECS)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let out = f(&*tx)?;
        // Nothing was written; finishing the transaction just releases the snapshot.
        tx.finish()?;
        Ok(out)
    }
}

/// A stored user row without its derived memberships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub userid: String,
    pub first_name: String,
    pub last_name: String,
}

// --- users ---

pub fn user_exists(conn: &Connection, userid: &str) -> Result<bool, DirectoryError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE userid = ?1",
        params![userid],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn fetch_user(conn: &Connection, userid: &str) -> Result<Option<UserRow>, DirectoryError> {
    conn.query_row(
        "SELECT userid, first_name, last_name FROM users WHERE userid = ?1",
        params![userid],
        |row| {
            Ok(UserRow {
                userid: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(DirectoryError::RusqliteError)
}

pub fn insert_user(conn: &Connection, user: &UserRow) -> Result<(), DirectoryError> {
    conn.execute(
        "INSERT INTO users(userid, first_name, last_name) VALUES(?1, ?2, ?3)",
        params![user.userid, user.first_name, user.last_name],
    )?;
    Ok(())
}

pub fn update_user_names(
    conn: &Connection,
    userid: &str,
    first_name: &str,
    last_name: &str,
) -> Result<usize, DirectoryError> {
    let changed = conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2 WHERE userid = ?3",
        params![first_name, last_name, userid],
    )?;
    Ok(changed)
}

/// Deletes the user row; memberships go with it through the foreign key cascade.
pub fn delete_user(conn: &Connection, userid: &str) -> Result<usize, DirectoryError> {
    let changed = conn.execute("DELETE FROM users WHERE userid = ?1", params![userid])?;
    Ok(changed)
}

pub fn all_userids(conn: &Connection) -> Result<Vec<String>, DirectoryError> {
    collect_strings(conn, "SELECT userid FROM users ORDER BY rowid", params![])
}

// --- groups ---

pub fn group_exists(conn: &Connection, group_name: &str) -> Result<bool, DirectoryError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM groups WHERE group_name = ?1",
        params![group_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn insert_group(conn: &Connection, group_name: &str) -> Result<(), DirectoryError> {
    conn.execute(
        "INSERT INTO groups(group_name) VALUES(?1)",
        params![group_name],
    )?;
    Ok(())
}

/// Deletes the group row; memberships go with it through the foreign key cascade.
pub fn delete_group(conn: &Connection, group_name: &str) -> Result<usize, DirectoryError> {
    let changed = conn.execute(
        "DELETE FROM groups WHERE group_name = ?1",
        params![group_name],
    )?;
    Ok(changed)
}

pub fn all_group_names(conn: &Connection) -> Result<Vec<String>, DirectoryError> {
    collect_strings(conn, "SELECT group_name FROM groups ORDER BY rowid", params![])
}

// --- memberships ---

pub fn groups_of_user(conn: &Connection, userid: &str) -> Result<Vec<String>, DirectoryError> {
    collect_strings(
        conn,
        "SELECT group_name FROM memberships WHERE userid = ?1 ORDER BY id",
        params![userid],
    )
}

pub fn members_of_group(
    conn: &Connection,
    group_name: &str,
) -> Result<Vec<String>, DirectoryError> {
    collect_strings(
        conn,
        "SELECT userid FROM memberships WHERE group_name = ?1 ORDER BY id",
        params![group_name],
    )
}

pub fn insert_membership(
    conn: &Connection,
    userid: &str,
    group_name: &str,
) -> Result<(), DirectoryError> {
    conn.execute(
        "INSERT INTO memberships(userid, group_name) VALUES(?1, ?2)",
        params![userid, group_name],
    )?;
    Ok(())
}

pub fn clear_user_memberships(conn: &Connection, userid: &str) -> Result<usize, DirectoryError> {
    let changed = conn.execute(
        "DELETE FROM memberships WHERE userid = ?1",
        params![userid],
    )?;
    Ok(changed)
}

pub fn clear_group_memberships(
    conn: &Connection,
    group_name: &str,
) -> Result<usize, DirectoryError> {
    let changed = conn.execute(
        "DELETE FROM memberships WHERE group_name = ?1",
        params![group_name],
    )?;
    Ok(changed)
}

/// Total membership rows referencing `userid` or `group_name`; used to check cascades.
pub fn count_memberships(
    conn: &Connection,
    userid: Option<&str>,
    group_name: Option<&str>,
) -> Result<i64, DirectoryError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memberships
         WHERE (?1 IS NULL OR userid = ?1) AND (?2 IS NULL OR group_name = ?2)",
        params![userid, group_name],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn collect_strings(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<String>, DirectoryError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
