//! Core modules for the directory: storage, validation and the service handle.

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod migration;
pub mod schemas;
pub mod store;
pub mod validate;
