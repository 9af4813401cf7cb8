//! # storage-blob
//!
//! The filesystem blob store. Every file body is stored, already encrypted
//! by `storage-crypto`, as a single opaque blob under the storage root `R`:
//!
//! ```text
//! R/<owner-id>/<file-id>.enc          active blobs
//! R/<owner-id>/.trash/<file-id>.enc   soft-deleted blobs
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             File Service                │
//! ├─────────────────────────────────────────┤
//! │             BlobStore Trait             │
//! ├─────────────────────┬───────────────────┤
//! │    LocalBlobStore    │   MemoryBlobStore │
//! └─────────────────────┴───────────────────┘
//! ```
//!
//! Multiple metadata rows can share one `storage_path` (deduplication); the
//! blob store itself knows nothing about reference counts — callers must
//! check for remaining references before calling `move_to_trash` or
//! `delete`.

pub mod error;
pub mod local;
pub mod memory;
pub mod path;

pub use error::{BlobError, Result};
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use path::StoragePath;

use async_trait::async_trait;

/// Trait for blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` to `path`, replacing anything already there. Writes are
    /// atomic: a reader never observes a partially written blob.
    async fn put(&self, path: &StoragePath, data: &[u8]) -> Result<()>;

    /// Read the full contents of the blob at `path`.
    async fn get(&self, path: &StoragePath) -> Result<Vec<u8>>;

    /// Whether a blob exists at `path` (active, not trashed).
    async fn exists(&self, path: &StoragePath) -> Result<bool>;

    /// Move an active blob into that owner's trash.
    async fn move_to_trash(&self, path: &StoragePath) -> Result<()>;

    /// Move a trashed blob back to active storage.
    async fn restore_from_trash(&self, path: &StoragePath) -> Result<()>;

    /// Permanently delete a blob, active or trashed.
    async fn delete(&self, path: &StoragePath) -> Result<()>;
}
