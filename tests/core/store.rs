use rusqlite::Connection;
use tempfile::tempdir;
use userdir::core::error::DirectoryError;
use userdir::core::db;
use userdir::core::migration::migrate;
use userdir::core::schemas;
use userdir::core::store::{self, Store, UserRow};

fn user(id: &str) -> UserRow {
    UserRow {
        userid: id.to_string(),
        first_name: "First".to_string(),
        last_name: "Last".to_string(),
    }
}

#[test]
fn migration_is_idempotent() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("nested/dir/dir.db"));

    let first = migrate(&store).unwrap();
    assert!(first.applied);
    assert_eq!(first.from_version, 0);
    assert_eq!(first.to_version, schemas::DIRECTORY_SCHEMA_VERSION);

    store.with_write(|conn| store::insert_group(conn, "admins")).unwrap();

    let second = migrate(&store).unwrap();
    assert!(!second.applied);
    // Re-running the bootstrap keeps existing rows.
    assert_eq!(
        store.with_read(store::all_group_names).unwrap(),
        vec!["admins"]
    );
}

#[test]
fn failed_write_rolls_back_every_statement() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("dir.db"));
    migrate(&store).unwrap();

    let result: Result<(), DirectoryError> = store.with_write(|conn| {
        store::insert_group(conn, "admins")?;
        store::insert_user(conn, &user("jsmith"))?;
        store::insert_membership(conn, "jsmith", "admins")?;
        Err(DirectoryError::MalformedRecord("abort".into()))
    });
    assert!(result.is_err());

    store
        .with_read(|conn| {
            assert!(!store::group_exists(conn, "admins")?);
            assert!(!store::user_exists(conn, "jsmith")?);
            assert_eq!(store::count_memberships(conn, None, None)?, 0);
            Ok(())
        })
        .unwrap();
}

#[test]
fn schema_rejects_dangling_and_duplicate_edges() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("dir.db"));
    migrate(&store).unwrap();
    store
        .with_write(|conn| {
            store::insert_group(conn, "admins")?;
            store::insert_user(conn, &user("jsmith"))?;
            store::insert_membership(conn, "jsmith", "admins")
        })
        .unwrap();

    let dangling = store.with_write(|conn| store::insert_membership(conn, "ghost", "admins"));
    assert!(matches!(dangling, Err(DirectoryError::RusqliteError(_))));

    let duplicate = store.with_write(|conn| store::insert_membership(conn, "jsmith", "admins"));
    assert!(matches!(duplicate, Err(DirectoryError::RusqliteError(_))));

    assert_eq!(
        store
            .with_read(|conn| store::count_memberships(conn, None, None))
            .unwrap(),
        1
    );
}

#[test]
fn deleting_rows_cascades_memberships() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("dir.db"));
    migrate(&store).unwrap();
    store
        .with_write(|conn| {
            for g in ["admins", "users"] {
                store::insert_group(conn, g)?;
            }
            for u in ["jsmith", "gmartin"] {
                store::insert_user(conn, &user(u))?;
                store::insert_membership(conn, u, "admins")?;
                store::insert_membership(conn, u, "users")?;
            }
            Ok(())
        })
        .unwrap();

    store
        .with_write(|conn| store::delete_user(conn, "jsmith"))
        .unwrap();
    store
        .with_write(|conn| store::delete_group(conn, "users"))
        .unwrap();

    store
        .with_read(|conn| {
            assert_eq!(store::count_memberships(conn, Some("jsmith"), None)?, 0);
            assert_eq!(store::count_memberships(conn, None, Some("users"))?, 0);
            assert_eq!(store::groups_of_user(conn, "gmartin")?, vec!["admins"]);
            Ok(())
        })
        .unwrap();
}

#[test]
fn membership_reads_follow_insertion_order() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("dir.db"));
    migrate(&store).unwrap();
    store
        .with_write(|conn| {
            for g in ["zeta", "alpha", "mid"] {
                store::insert_group(conn, g)?;
            }
            store::insert_user(conn, &user("u1"))?;
            store::insert_membership(conn, "u1", "mid")?;
            store::insert_membership(conn, "u1", "zeta")?;
            store::insert_membership(conn, "u1", "alpha")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(
        store
            .with_read(|conn| store::groups_of_user(conn, "u1"))
            .unwrap(),
        vec!["mid", "zeta", "alpha"]
    );
}

#[test]
fn readers_never_see_a_half_replaced_membership_set() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("dir.db");
    let store = Store::open(&db_path);
    migrate(&store).unwrap();
    store
        .with_write(|conn| {
            store::insert_group(conn, "admins")?;
            store::insert_user(conn, &user("jsmith"))?;
            store::insert_membership(conn, "jsmith", "admins")
        })
        .unwrap();

    // Observe the table from a second connection while the replacement is mid-flight.
    let observer = Connection::open(&db_path).unwrap();
    store
        .with_write(|conn| {
            store::clear_user_memberships(conn, "jsmith")?;
            let seen: i64 = observer
                .query_row(
                    "SELECT COUNT(*) FROM memberships WHERE userid = 'jsmith'",
                    [],
                    |row| row.get(0),
                )
                .map_err(DirectoryError::RusqliteError)?;
            assert_eq!(seen, 1, "uncommitted delete must not be visible");
            store::insert_membership(conn, "jsmith", "admins")
        })
        .unwrap();
}

#[test]
fn connections_enforce_foreign_keys_and_wal() {
    let tmp = tempdir().unwrap();
    let conn = db::db_connect(&tmp.path().join("dir.db").to_string_lossy()).unwrap();
    let fk: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fk, 1);
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn panicking_write_does_not_wedge_later_writes() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("dir.db"));
    migrate(&store).unwrap();

    let crashed = std::panic::catch_unwind(|| {
        store.with_write(|conn| -> Result<(), DirectoryError> {
            store::insert_group(conn, "half")?;
            panic!("writer crashed mid-transaction");
        })
    });
    assert!(crashed.is_err());

    store
        .with_write(|conn| store::insert_group(conn, "admins"))
        .unwrap();
    assert_eq!(
        store.with_read(store::all_group_names).unwrap(),
        vec!["admins"]
    );
}

#[test]
fn upgrade_from_v1_keeps_membership_order() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("dir.db");
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys=ON;
             CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta(key, value) VALUES('schema_version', '1');
             CREATE TABLE users (userid TEXT PRIMARY KEY, first_name TEXT NOT NULL, last_name TEXT NOT NULL);
             CREATE TABLE groups (group_name TEXT PRIMARY KEY);
             CREATE TABLE memberships (
                 userid TEXT NOT NULL,
                 group_name TEXT NOT NULL,
                 UNIQUE(userid, group_name),
                 FOREIGN KEY(userid) REFERENCES users(userid) ON DELETE CASCADE,
                 FOREIGN KEY(group_name) REFERENCES groups(group_name) ON DELETE CASCADE
             );
             CREATE INDEX idx_memberships_group ON memberships(group_name);
             INSERT INTO users VALUES('u1', 'First', 'Last');
             INSERT INTO groups VALUES('zeta'), ('alpha'), ('mid');
             INSERT INTO memberships(userid, group_name) VALUES('u1', 'mid'), ('u1', 'zeta'), ('u1', 'alpha');",
        )
        .unwrap();
    }

    let store = Store::open(&db_path);
    let report = migrate(&store).unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.to_version, schemas::DIRECTORY_SCHEMA_VERSION);
    assert!(report.applied);

    store
        .with_read(|conn| {
            assert_eq!(store::groups_of_user(conn, "u1")?, vec!["mid", "zeta", "alpha"]);
            let max_id: i64 = conn.query_row("SELECT MAX(id) FROM memberships", [], |row| {
                row.get(0)
            })?;
            assert_eq!(max_id, 3);
            Ok(())
        })
        .unwrap();

    // The rebuilt table still cascades.
    store
        .with_write(|conn| store::delete_group(conn, "zeta"))
        .unwrap();
    assert_eq!(
        store
            .with_read(|conn| store::groups_of_user(conn, "u1"))
            .unwrap(),
        vec!["mid", "alpha"]
    );
    assert!(!migrate(&store).unwrap().applied);
}
