//! User operations and the `user` command group.

use crate::core::directory::Directory;
use crate::core::error;
use crate::core::store::{self, UserRow};
use crate::core::validate::{self, UserRecord};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

pub const MSG_USER_UPDATED: &str = "record updated";
pub const MSG_USER_DELETED: &str = "delete success";

#[derive(Parser, Debug)]
#[clap(name = "user", about = "Manage user records.")]
pub struct UserCli {
    #[clap(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Show a user and the groups it belongs to.
    Get { userid: String },
    /// Create a user. Every listed group must already exist.
    Create {
        #[clap(long)]
        userid: String,
        #[clap(long)]
        first_name: String,
        #[clap(long)]
        last_name: String,
        /// Group to join; repeat for several, order is kept.
        #[clap(long = "group")]
        groups: Vec<String>,
    },
    /// Replace a user's names and full group list.
    Update {
        userid: String,
        #[clap(long)]
        first_name: String,
        #[clap(long)]
        last_name: String,
        #[clap(long = "group")]
        groups: Vec<String>,
    },
    /// Delete a user and all of its memberships.
    Delete { userid: String },
    /// List every userid.
    List,
}

impl Directory {
    pub fn get_user(&self, userid: &str) -> Result<UserRecord, error::DirectoryError> {
        let record = self
            .store()
            .with_read(|conn| load_user(conn, userid))?
            .ok_or_else(|| error::DirectoryError::NotFound(format!("user '{}'", userid)))?;
        debug!(userid, groups = record.groups.len(), "user.get");
        Ok(record)
    }

    /// Insert a user and its memberships as one unit.
    pub fn create_user(&self, candidate: &JsonValue) -> Result<UserRecord, error::DirectoryError> {
        let record = validate::user_record(candidate)?;

        self.store().with_write(|conn| {
            // A bad record is reported before a duplicate userid.
            let valid_groups = store::all_group_names(conn)?;
            validate::group_exists(&record.groups, &valid_groups)?;
            if store::user_exists(conn, &record.userid)? {
                return Err(error::DirectoryError::Conflict(format!(
                    "user '{}'",
                    record.userid
                )));
            }

            store::insert_user(
                conn,
                &UserRow {
                    userid: record.userid.clone(),
                    first_name: record.first_name.clone(),
                    last_name: record.last_name.clone(),
                },
            )?;
            for group_name in &record.groups {
                store::insert_membership(conn, &record.userid, group_name)?;
            }
            Ok(())
        })?;

        info!(userid = %record.userid, groups = ?record.groups, "user.create");
        Ok(record)
    }

    /// Replace names in place and the membership set wholesale.
    pub fn update_user(
        &self,
        userid: &str,
        candidate: &JsonValue,
    ) -> Result<UserRecord, error::DirectoryError> {
        let record = self.store().with_write(|conn| {
            if !store::user_exists(conn, userid)? {
                return Err(error::DirectoryError::NotFound(format!("user '{}'", userid)));
            }
            let record = validate::user_record(candidate)?;
            if record.userid != userid {
                return Err(error::DirectoryError::MalformedRecord(format!(
                    "userid '{}' does not match '{}'",
                    record.userid, userid
                )));
            }
            let valid_groups = store::all_group_names(conn)?;
            validate::group_exists(&record.groups, &valid_groups)?;

            store::update_user_names(conn, userid, &record.first_name, &record.last_name)?;
            store::clear_user_memberships(conn, userid)?;
            for group_name in &record.groups {
                store::insert_membership(conn, userid, group_name)?;
            }
            Ok(record)
        })?;

        info!(userid, groups = ?record.groups, "user.update");
        Ok(record)
    }

    pub fn delete_user(&self, userid: &str) -> Result<(), error::DirectoryError> {
        self.store().with_write(|conn| {
            if store::delete_user(conn, userid)? == 0 {
                return Err(error::DirectoryError::NotFound(format!("user '{}'", userid)));
            }
            Ok(())
        })?;
        info!(userid, "user.delete");
        Ok(())
    }

    pub fn has_user(&self, userid: &str) -> Result<bool, error::DirectoryError> {
        self.store().with_read(|conn| store::user_exists(conn, userid))
    }

    pub fn list_users(&self) -> Result<Vec<String>, error::DirectoryError> {
        self.store().with_read(store::all_userids)
    }
}

fn load_user(conn: &Connection, userid: &str) -> Result<Option<UserRecord>, error::DirectoryError> {
    let Some(row) = store::fetch_user(conn, userid)? else {
        return Ok(None);
    };
    let groups = store::groups_of_user(conn, userid)?;
    Ok(Some(UserRecord {
        first_name: row.first_name,
        last_name: row.last_name,
        userid: row.userid,
        groups,
    }))
}

fn record_json(userid: &str, first_name: &str, last_name: &str, groups: &[String]) -> JsonValue {
    serde_json::json!({
        "userid": userid,
        "first_name": first_name,
        "last_name": last_name,
        "groups": groups,
    })
}

pub fn schema() -> JsonValue {
    serde_json::json!({
        "name": "user",
        "description": "Manage user records",
        "commands": [
            { "name": "get", "parameters": ["userid"] },
            { "name": "create", "parameters": ["userid", "first_name", "last_name", "group"] },
            { "name": "update", "parameters": ["userid", "first_name", "last_name", "group"] },
            { "name": "delete", "parameters": ["userid"] },
            { "name": "list", "parameters": [] }
        ],
        "storage": ["users", "memberships"]
    })
}

pub fn run_user_cli(directory: &Directory, cli: UserCli) -> Result<JsonValue, error::DirectoryError> {
    let out = match &cli.command {
        UserCommand::Get { userid } => serde_json::json!(directory.get_user(userid)?),
        UserCommand::Create {
            userid,
            first_name,
            last_name,
            groups,
        } => {
            let created =
                directory.create_user(&record_json(userid, first_name, last_name, groups))?;
            serde_json::json!({ "user": created })
        }
        UserCommand::Update {
            userid,
            first_name,
            last_name,
            groups,
        } => {
            directory.update_user(userid, &record_json(userid, first_name, last_name, groups))?;
            serde_json::json!({ "message": MSG_USER_UPDATED })
        }
        UserCommand::Delete { userid } => {
            directory.delete_user(userid)?;
            serde_json::json!({ "message": MSG_USER_DELETED })
        }
        UserCommand::List => serde_json::json!({ "userids": directory.list_users()? }),
    };
    Ok(out)
}
