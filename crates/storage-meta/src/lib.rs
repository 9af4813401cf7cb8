//! # storage-meta
//!
//! Postgres-backed metadata repository. Each module is a thin, typed
//! wrapper over `sqlx` queries for one table family; callers (in
//! `storage-core`) compose these into the atomic multi-statement units
//! spec §4.3 requires using `sqlx::Transaction`.

pub mod error;
pub mod files;
pub mod invitations;
pub mod models;
pub mod password_reset;
pub mod pool;
pub mod settings;
pub mod shares;
pub mod users;

pub use error::{MetaError, Result};
pub use pool::connect_and_migrate;
