use serde_json::json;
use tempfile::{TempDir, tempdir};
use userdir::core::directory::Directory;
use userdir::core::error::DirectoryError;
use userdir::core::migration::migrate;
use userdir::core::store::{self, Store};
use userdir::core::validate::UserRecord;

fn setup() -> (TempDir, Directory) {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("dir.db"));
    migrate(&store).unwrap();
    let directory = Directory::new(store);
    directory.create_group(&json!({ "name": "admins" })).unwrap();
    directory.create_group(&json!({ "name": "users" })).unwrap();
    (tmp, directory)
}

fn jsmith() -> serde_json::Value {
    json!({
        "userid": "jsmith",
        "first_name": "John",
        "last_name": "Smith",
        "groups": ["users", "admins"]
    })
}

#[test]
fn test_user_lifecycle() {
    let (_tmp, directory) = setup();

    // 1. Create
    let created = directory.create_user(&jsmith()).unwrap();
    assert_eq!(created.userid, "jsmith");

    // 2. Get returns the record with groups in insertion order
    let user = directory.get_user("jsmith").unwrap();
    assert_eq!(
        user,
        UserRecord {
            first_name: "John".into(),
            last_name: "Smith".into(),
            userid: "jsmith".into(),
            groups: vec!["users".into(), "admins".into()],
        }
    );

    // 3. Delete
    directory.delete_user("jsmith").unwrap();
    assert!(matches!(
        directory.get_user("jsmith"),
        Err(DirectoryError::NotFound(_))
    ));
    let residue = directory
        .store()
        .with_read(|conn| store::count_memberships(conn, Some("jsmith"), None))
        .unwrap();
    assert_eq!(residue, 0);
}

#[test]
fn test_get_user_serializes_in_wire_shape() {
    let (_tmp, directory) = setup();
    directory.create_user(&jsmith()).unwrap();
    let value = serde_json::to_value(directory.get_user("jsmith").unwrap()).unwrap();
    assert_eq!(
        value,
        json!({
            "first_name": "John",
            "last_name": "Smith",
            "userid": "jsmith",
            "groups": ["users", "admins"]
        })
    );
}

#[test]
fn test_create_user_without_groups() {
    let (_tmp, directory) = setup();
    directory
        .create_user(&json!({
            "userid": "loner",
            "first_name": "Lo",
            "last_name": "Ner",
            "groups": []
        }))
        .unwrap();
    assert!(directory.get_user("loner").unwrap().groups.is_empty());
}

#[test]
fn test_create_duplicate_user_conflicts() {
    let (_tmp, directory) = setup();
    directory.create_user(&jsmith()).unwrap();

    let mut again = jsmith();
    again["first_name"] = json!("Johnny");
    again["groups"] = json!([]);
    let err = directory.create_user(&again).unwrap_err();
    assert!(matches!(err, DirectoryError::Conflict(_)));
    assert_eq!(err.status(), 403);

    // Creation is never an implicit update.
    let user = directory.get_user("jsmith").unwrap();
    assert_eq!(user.first_name, "John");
    assert_eq!(user.groups, vec!["users", "admins"]);
}

#[test]
fn test_create_duplicate_user_with_unknown_group_is_invalid() {
    let (_tmp, directory) = setup();
    directory.create_user(&jsmith()).unwrap();

    let mut again = jsmith();
    again["groups"] = json!(["designers"]);
    let err = directory.create_user(&again).unwrap_err();
    assert!(matches!(err, DirectoryError::UnknownGroup(ref g) if g == "designers"));
    assert_eq!(err.status(), 400);

    assert_eq!(
        directory.get_user("jsmith").unwrap().groups,
        vec!["users", "admins"]
    );
}

#[test]
fn test_create_user_with_unknown_group_persists_nothing() {
    let (_tmp, directory) = setup();
    let err = directory
        .create_user(&json!({
            "userid": "ss",
            "first_name": "Sharad",
            "last_name": "Shivmath",
            "groups": ["admins", "designers"]
        }))
        .unwrap_err();
    assert!(matches!(err, DirectoryError::UnknownGroup(ref g) if g == "designers"));
    assert_eq!(err.status(), 400);

    assert!(matches!(
        directory.get_user("ss"),
        Err(DirectoryError::NotFound(_))
    ));
    let rows = directory
        .store()
        .with_read(|conn| store::count_memberships(conn, Some("ss"), None))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn test_create_malformed_user() {
    let (_tmp, directory) = setup();
    let err = directory
        .create_user(&json!({
            "first_name": "Sharad",
            "last_name": "Shivmath",
            "groups": ["admins"]
        }))
        .unwrap_err();
    assert!(matches!(err, DirectoryError::MalformedRecord(_)));
    assert_eq!(err.status(), 400);
    assert!(directory.list_users().unwrap().is_empty());
}

#[test]
fn test_update_replaces_names_and_memberships() {
    let (_tmp, directory) = setup();
    directory.create_user(&jsmith()).unwrap();

    directory
        .update_user(
            "jsmith",
            &json!({
                "userid": "jsmith",
                "first_name": "Johnny",
                "last_name": "Smithy",
                "groups": ["admins"]
            }),
        )
        .unwrap();

    let user = directory.get_user("jsmith").unwrap();
    assert_eq!(user.first_name, "Johnny");
    assert_eq!(user.last_name, "Smithy");
    assert_eq!(user.groups, vec!["admins"]);

    // Reordering is a replacement too.
    directory
        .update_user(
            "jsmith",
            &json!({
                "userid": "jsmith",
                "first_name": "Johnny",
                "last_name": "Smithy",
                "groups": ["users", "admins"]
            }),
        )
        .unwrap();
    assert_eq!(
        directory.get_user("jsmith").unwrap().groups,
        vec!["users", "admins"]
    );
}

#[test]
fn test_update_unknown_user_is_not_found() {
    let (_tmp, directory) = setup();
    // Existence is checked before shape.
    let err = directory
        .update_user("jsmit", &json!({ "first_name": "only" }))
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NotFound(_)));
}

#[test]
fn test_failed_update_leaves_record_untouched() {
    let (_tmp, directory) = setup();
    directory.create_user(&jsmith()).unwrap();
    let before = directory.get_user("jsmith").unwrap();

    let bad_group = directory.update_user(
        "jsmith",
        &json!({
            "userid": "jsmith",
            "first_name": "X",
            "last_name": "Y",
            "groups": ["ghosts"]
        }),
    );
    assert!(matches!(bad_group, Err(DirectoryError::UnknownGroup(_))));

    let missing_field = directory.update_user(
        "jsmith",
        &json!({ "userid": "jsmith", "first_name": "X", "last_name": "Y" }),
    );
    assert!(matches!(
        missing_field,
        Err(DirectoryError::MalformedRecord(_))
    ));

    let renamed = directory.update_user(
        "jsmith",
        &json!({
            "userid": "someone_else",
            "first_name": "X",
            "last_name": "Y",
            "groups": []
        }),
    );
    assert!(matches!(renamed, Err(DirectoryError::MalformedRecord(_))));

    assert_eq!(directory.get_user("jsmith").unwrap(), before);
}

#[test]
fn test_delete_unknown_user() {
    let (_tmp, directory) = setup();
    assert!(matches!(
        directory.delete_user("ss"),
        Err(DirectoryError::NotFound(_))
    ));
}

#[test]
fn test_list_users_in_creation_order() {
    let (_tmp, directory) = setup();
    for id in ["c", "a", "b"] {
        directory
            .create_user(&json!({
                "userid": id,
                "first_name": id,
                "last_name": id,
                "groups": []
            }))
            .unwrap();
    }
    assert_eq!(directory.list_users().unwrap(), vec!["c", "a", "b"]);
    assert!(directory.has_user("a").unwrap());
    assert!(!directory.has_user("z").unwrap());
}
