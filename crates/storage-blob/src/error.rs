//! Error types for the storage-blob crate

use thiserror::Error;

/// Result type alias using `BlobError`
pub type Result<T> = std::result::Result<T, BlobError>;

/// Errors that can occur during blob storage operations
#[derive(Error, Debug)]
pub enum BlobError {
    /// Blob not found at the given storage path
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Storage path failed to parse
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    /// IO error talking to the filesystem
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Crypto error surfaced while the blob store validated envelope framing
    #[error("crypto error: {0}")]
    Crypto(#[from] storage_crypto::CryptoError),
}
