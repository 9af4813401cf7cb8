//! Error types for the storage-meta crate

use thiserror::Error;

/// Result type alias using `MetaError`
pub type Result<T> = std::result::Result<T, MetaError>;

/// Errors surfaced by the metadata repository layer.
#[derive(Error, Debug)]
pub enum MetaError {
    /// The requested row does not exist (or is not visible to the caller).
    #[error("not found")]
    NotFound,

    /// A unique constraint was violated (duplicate email, token, etc).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
