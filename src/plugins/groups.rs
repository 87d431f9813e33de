//! Group operations and the `group` command group.

use crate::core::directory::Directory;
use crate::core::error;
use crate::core::store;
use crate::core::validate;
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

pub const MSG_GROUP_CREATED: &str = "new empty group added";
pub const MSG_GROUP_MEMBERS_UPDATED: &str = "group memberships updated";
pub const MSG_GROUP_DELETED: &str = "group deleted";

#[derive(Parser, Debug)]
#[clap(name = "group", about = "Manage groups and their member lists.")]
pub struct GroupCli {
    #[clap(subcommand)]
    pub command: GroupCommand,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Show the userids that belong to a group.
    Get { name: String },
    /// Create an empty group.
    Create { name: String },
    /// Replace a group's full member list.
    SetMembers {
        name: String,
        /// Member userid; repeat for several, order is kept. Omit to empty the group.
        #[clap(long = "user")]
        userids: Vec<String>,
    },
    /// Delete a group and all of its memberships.
    Delete { name: String },
    /// List every group name.
    List,
}

impl Directory {
    /// Members of `group_name` in insertion order.
    pub fn get_group_members(&self, group_name: &str) -> Result<Vec<String>, error::DirectoryError> {
        let legacy = self.options().legacy_empty_group_not_found;
        let members = self.store().with_read(|conn| {
            if !store::group_exists(conn, group_name)? {
                return Err(error::DirectoryError::NotFound(format!(
                    "group '{}'",
                    group_name
                )));
            }
            let members = store::members_of_group(conn, group_name)?;
            if legacy && members.is_empty() {
                return Err(error::DirectoryError::NotFound(format!(
                    "group '{}' has no members",
                    group_name
                )));
            }
            Ok(members)
        })?;
        debug!(group = group_name, members = members.len(), "group.get");
        Ok(members)
    }

    pub fn create_group(&self, candidate: &JsonValue) -> Result<String, error::DirectoryError> {
        let record = validate::group_record(candidate)?;
        self.store().with_write(|conn| {
            if store::group_exists(conn, &record.name)? {
                return Err(error::DirectoryError::Conflict(format!(
                    "group '{}'",
                    record.name
                )));
            }
            store::insert_group(conn, &record.name)
        })?;
        info!(group = %record.name, "group.create");
        Ok(record.name)
    }

    /// Swap the whole member list of a group. Every userid must already exist.
    pub fn replace_group_members(
        &self,
        group_name: &str,
        candidate: &JsonValue,
    ) -> Result<Vec<String>, error::DirectoryError> {
        let members = self.store().with_write(|conn| {
            if !store::group_exists(conn, group_name)? {
                return Err(error::DirectoryError::NotFound(format!(
                    "group '{}'",
                    group_name
                )));
            }
            let list = validate::member_list(candidate)?;
            let valid_users = store::all_userids(conn)?;
            validate::users_exist(&list.userids, &valid_users)?;

            store::clear_group_memberships(conn, group_name)?;
            for userid in &list.userids {
                store::insert_membership(conn, userid, group_name)?;
            }
            Ok(list.userids)
        })?;
        info!(group = group_name, members = ?members, "group.set_members");
        Ok(members)
    }

    pub fn delete_group(&self, group_name: &str) -> Result<(), error::DirectoryError> {
        self.store().with_write(|conn| {
            if store::delete_group(conn, group_name)? == 0 {
                return Err(error::DirectoryError::NotFound(format!(
                    "group '{}'",
                    group_name
                )));
            }
            Ok(())
        })?;
        info!(group = group_name, "group.delete");
        Ok(())
    }

    pub fn has_group(&self, group_name: &str) -> Result<bool, error::DirectoryError> {
        self.store().with_read(|conn| store::group_exists(conn, group_name))
    }

    pub fn list_groups(&self) -> Result<Vec<String>, error::DirectoryError> {
        self.store().with_read(store::all_group_names)
    }
}

pub fn schema() -> JsonValue {
    serde_json::json!({
        "name": "group",
        "description": "Manage groups and their member lists",
        "commands": [
            { "name": "get", "parameters": ["name"] },
            { "name": "create", "parameters": ["name"] },
            { "name": "set-members", "parameters": ["name", "user"] },
            { "name": "delete", "parameters": ["name"] },
            { "name": "list", "parameters": [] }
        ],
        "storage": ["groups", "memberships"]
    })
}

pub fn run_group_cli(
    directory: &Directory,
    cli: GroupCli,
) -> Result<JsonValue, error::DirectoryError> {
    let out = match &cli.command {
        GroupCommand::Get { name } => {
            serde_json::json!({ "userids": directory.get_group_members(name)? })
        }
        GroupCommand::Create { name } => {
            directory.create_group(&serde_json::json!({ "name": name }))?;
            serde_json::json!({ "message": MSG_GROUP_CREATED })
        }
        GroupCommand::SetMembers { name, userids } => {
            directory.replace_group_members(name, &serde_json::json!({ "userids": userids }))?;
            serde_json::json!({ "message": MSG_GROUP_MEMBERS_UPDATED })
        }
        GroupCommand::Delete { name } => {
            directory.delete_group(name)?;
            serde_json::json!({ "message": MSG_GROUP_DELETED })
        }
        GroupCommand::List => serde_json::json!({ "groups": directory.list_groups()? }),
    };
    Ok(out)
}
