//! Centralized database schema definitions for the directory store.
//!
//! One SQLite database holds the three tables of the directory:
//! 1. users: one row per account, keyed by `userid`.
//! 2. groups: one row per group, keyed by `group_name`.
//! 3. memberships: the user/group edge set, cascading on delete from either side.

pub const DIRECTORY_DB_NAME: &str = "userdir.db";

/// Bumped whenever a statement below changes shape.
pub const DIRECTORY_SCHEMA_VERSION: u32 = 2;

pub const DIRECTORY_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const DIRECTORY_DB_SCHEMA_USERS: &str = "
    CREATE TABLE IF NOT EXISTS users (
        userid TEXT PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL
    )
";

pub const DIRECTORY_DB_SCHEMA_GROUPS: &str = "
    CREATE TABLE IF NOT EXISTS groups (
        group_name TEXT PRIMARY KEY
    )
";

// `id` order is the insertion order reported back to callers.
pub const DIRECTORY_DB_SCHEMA_MEMBERSHIPS: &str = "
    CREATE TABLE IF NOT EXISTS memberships (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        userid TEXT NOT NULL,
        group_name TEXT NOT NULL,
        UNIQUE(userid, group_name),
        FOREIGN KEY(userid) REFERENCES users(userid) ON DELETE CASCADE,
        FOREIGN KEY(group_name) REFERENCES groups(group_name) ON DELETE CASCADE
    )
";

pub const DIRECTORY_DB_SCHEMA_INDEX_MEMBERSHIPS_GROUP: &str =
    "CREATE INDEX IF NOT EXISTS idx_memberships_group ON memberships(group_name)";
