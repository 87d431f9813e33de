//! The directory service handle.
//!
//! `Directory` owns an explicit `Store` and is cheap to clone into request
//! handlers. User operations live in `plugins::users`, group operations in
//! `plugins::groups`; each runs as exactly one store transaction.

use crate::core::config::DirectoryConfig;
use crate::core::error::DirectoryError;
use crate::core::migration::{self, MigrationReport};
use crate::core::store::Store;
use std::sync::Arc;

/// Behavior switches that change observable results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// Treat an existing group with no members as not found on member lookup.
    pub legacy_empty_group_not_found: bool,
}

#[derive(Debug, Clone)]
pub struct Directory {
    store: Arc<Store>,
    options: DirectoryOptions,
}

impl Directory {
    pub fn new(store: Store) -> Self {
        Self::with_options(store, DirectoryOptions::default())
    }

    pub fn with_options(store: Store, options: DirectoryOptions) -> Self {
        Self {
            store: Arc::new(store),
            options,
        }
    }

    /// Open the configured store and run the schema migration before returning.
    pub fn open(config: &DirectoryConfig) -> Result<(Self, MigrationReport), DirectoryError> {
        let store = Store::open(&config.database);
        let report = migration::migrate(&store)?;
        let options = DirectoryOptions {
            legacy_empty_group_not_found: config.legacy_empty_group_not_found,
        };
        Ok((Self::with_options(store, options), report))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn options(&self) -> DirectoryOptions {
        self.options
    }
}
