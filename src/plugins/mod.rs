//! Directory subsystems: one module per side of the membership relation.
//!
//! Each module extends `Directory` with its operations and exposes a clap
//! command group plus a `schema()` description.

pub mod groups;
pub mod users;
