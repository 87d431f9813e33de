use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to initialize database: {0}")]
    DatabaseInitializationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
    #[error("Unknown group: {0}")]
    UnknownGroup(String),
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Record already exists: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DirectoryError {
    /// HTTP status code the transport layer reports for this error.
    pub fn status(&self) -> u16 {
        match self {
            DirectoryError::MalformedRecord(_)
            | DirectoryError::UnknownGroup(_)
            | DirectoryError::UnknownUser(_) => 400,
            DirectoryError::Conflict(_) => 403,
            DirectoryError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// True for errors caused by caller input rather than the store.
    pub fn is_caller_error(&self) -> bool {
        self.status() < 500
    }

    /// Text placed in the `error` field of a response body.
    ///
    /// Infrastructure failures are not echoed to callers.
    pub fn reason(&self) -> String {
        if self.is_caller_error() {
            self.to_string()
        } else {
            "internal error".to_string()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.reason() })
    }
}
