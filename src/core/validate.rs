//! Shape and referential checks for incoming directory records.
//!
//! Everything here is pure: callers pass the authoritative group or user set
//! they read inside their own transaction.

use crate::core::error::DirectoryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A user as submitted by a caller and as returned by `get_user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub userid: String,
    pub groups: Vec<String>,
}

/// Body of a group creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
}

/// Body of a group membership replacement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberList {
    pub userids: Vec<String>,
}

/// Parse raw request bytes as JSON; anything unparseable is a malformed record.
pub fn parse_body(bytes: &[u8]) -> Result<Value, DirectoryError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(DirectoryError::MalformedRecord("empty body".into()));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| DirectoryError::MalformedRecord(format!("invalid JSON: {}", e)))
}

/// Check that `value` carries all four user fields with the right shapes.
pub fn user_record(value: &Value) -> Result<UserRecord, DirectoryError> {
    let obj = value
        .as_object()
        .ok_or_else(|| DirectoryError::MalformedRecord("user record must be an object".into()))?;

    let userid = required_string(obj, "userid")?;
    if userid.is_empty() {
        return Err(DirectoryError::MalformedRecord("userid must not be empty".into()));
    }
    let first_name = required_string(obj, "first_name")?;
    let last_name = required_string(obj, "last_name")?;
    let groups = required_string_list(obj, "groups")?;

    Ok(UserRecord {
        first_name,
        last_name,
        userid,
        groups,
    })
}

pub fn group_record(value: &Value) -> Result<GroupRecord, DirectoryError> {
    let obj = value
        .as_object()
        .ok_or_else(|| DirectoryError::MalformedRecord("group record must be an object".into()))?;
    let name = required_string(obj, "name")?;
    if name.is_empty() {
        return Err(DirectoryError::MalformedRecord("name must not be empty".into()));
    }
    Ok(GroupRecord { name })
}

pub fn member_list(value: &Value) -> Result<MemberList, DirectoryError> {
    let obj = value
        .as_object()
        .ok_or_else(|| DirectoryError::MalformedRecord("member list must be an object".into()))?;
    let userids = required_string_list(obj, "userids")?;
    Ok(MemberList { userids })
}

/// Every candidate must name a group in `valid_groups`. An empty list is valid.
pub fn group_exists<S: AsRef<str>>(
    candidates: &[S],
    valid_groups: &[String],
) -> Result<(), DirectoryError> {
    first_missing(candidates, valid_groups)
        .map_or(Ok(()), |g| Err(DirectoryError::UnknownGroup(g.to_string())))
}

/// Every candidate must name a user in `valid_users`. An empty list is valid.
pub fn users_exist<S: AsRef<str>>(
    candidates: &[S],
    valid_users: &[String],
) -> Result<(), DirectoryError> {
    first_missing(candidates, valid_users)
        .map_or(Ok(()), |u| Err(DirectoryError::UnknownUser(u.to_string())))
}

fn first_missing<'a, S: AsRef<str>>(candidates: &'a [S], valid: &[String]) -> Option<&'a str> {
    let valid: HashSet<&str> = valid.iter().map(String::as_str).collect();
    for candidate in candidates {
        let name: &str = candidate.as_ref();
        if !valid.contains(name) {
            return Some(name);
        }
    }
    None
}

fn required_string(
    obj: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, DirectoryError> {
    match obj.get(field) {
        None => Err(DirectoryError::MalformedRecord(format!(
            "missing field '{}'",
            field
        ))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DirectoryError::MalformedRecord(format!(
            "field '{}' must be a string",
            field
        ))),
    }
}

fn required_string_list(
    obj: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<Vec<String>, DirectoryError> {
    let items = match obj.get(field) {
        None => {
            return Err(DirectoryError::MalformedRecord(format!(
                "missing field '{}'",
                field
            )));
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(DirectoryError::MalformedRecord(format!(
                "field '{}' must be a list of strings",
                field
            )));
        }
    };

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let s = item.as_str().ok_or_else(|| {
            DirectoryError::MalformedRecord(format!(
                "field '{}' must be a list of strings",
                field
            ))
        })?;
        if !seen.insert(s) {
            return Err(DirectoryError::MalformedRecord(format!(
                "duplicate entry '{}' in '{}'",
                s, field
            )));
        }
        out.push(s.to_string());
    }
    Ok(out)
}
