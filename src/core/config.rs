//! Runtime configuration.
//!
//! Resolution order, later wins: built-in defaults, `userdir.toml` (or the file
//! passed with `--config`), `USERDIR_*` environment variables, command-line flags.

use crate::core::error::DirectoryError;
use crate::core::schemas;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "userdir.toml";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

pub const ENV_DATABASE: &str = "USERDIR_DATABASE";
pub const ENV_BIND: &str = "USERDIR_BIND";
pub const ENV_LOG: &str = "USERDIR_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryConfig {
    /// SQLite database file backing the store.
    pub database: PathBuf,
    /// Socket address the HTTP adapter listens on.
    pub bind: String,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Report an existing group with no members as not found.
    pub legacy_empty_group_not_found: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(schemas::DIRECTORY_DB_NAME),
            bind: DEFAULT_BIND.to_string(),
            log_filter: "info".to_string(),
            legacy_empty_group_not_found: false,
        }
    }
}

impl DirectoryConfig {
    /// Load from an explicit file, or from `userdir.toml` in `cwd` when present.
    ///
    /// An explicit path that does not exist is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, DirectoryError> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(DirectoryError::ConfigError(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let path = cwd.join(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, DirectoryError> {
        let content = fs::read_to_string(path).map_err(DirectoryError::IoError)?;
        Self::from_toml(&content)
            .map_err(|e| DirectoryError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, DirectoryError> {
        toml::from_str(content).map_err(|e| DirectoryError::ConfigError(e.to_string()))
    }

    /// Overlay environment values; `lookup` abstracts `std::env::var` for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database = PathBuf::from(db);
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
            self.bind = bind;
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_filter = filter;
        }
    }
}
