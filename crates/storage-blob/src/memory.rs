//! In-memory blob store for unit tests.

use crate::{BlobError, BlobStore, Result, StoragePath};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// An in-memory blob store, backed by a concurrent map keyed on the storage
/// path string. Active and trashed blobs are tracked as separate entries so
/// tests can exercise trash/restore semantics without a filesystem.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    active: Arc<DashMap<String, Vec<u8>>>,
    trashed: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active blobs.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of trashed blobs.
    pub fn trashed_len(&self) -> usize {
        self.trashed.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &StoragePath, data: &[u8]) -> Result<()> {
        self.active.insert(path.to_storage_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, path: &StoragePath) -> Result<Vec<u8>> {
        self.active
            .get(&path.to_storage_string())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobError::NotFound(path.to_storage_string()))
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool> {
        Ok(self.active.contains_key(&path.to_storage_string()))
    }

    async fn move_to_trash(&self, path: &StoragePath) -> Result<()> {
        let key = path.to_storage_string();
        let (_, data) = self
            .active
            .remove(&key)
            .ok_or_else(|| BlobError::NotFound(key.clone()))?;
        self.trashed.insert(key, data);
        Ok(())
    }

    async fn restore_from_trash(&self, path: &StoragePath) -> Result<()> {
        let key = path.to_storage_string();
        let (_, data) = self
            .trashed
            .remove(&key)
            .ok_or_else(|| BlobError::NotFound(key.clone()))?;
        self.active.insert(key, data);
        Ok(())
    }

    async fn delete(&self, path: &StoragePath) -> Result<()> {
        let key = path.to_storage_string();
        self.active.remove(&key);
        self.trashed.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn path() -> StoragePath {
        StoragePath::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryBlobStore::new();
        let p = path();
        store.put(&p, b"hello").await.unwrap();
        assert_eq!(store.get(&p).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn get_missing_fails() {
        let store = MemoryBlobStore::new();
        assert!(matches!(store.get(&path()).await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn trash_then_restore_roundtrip() {
        let store = MemoryBlobStore::new();
        let p = path();
        store.put(&p, b"data").await.unwrap();

        store.move_to_trash(&p).await.unwrap();
        assert!(!store.exists(&p).await.unwrap());
        assert_eq!(store.trashed_len(), 1);

        store.restore_from_trash(&p).await.unwrap();
        assert!(store.exists(&p).await.unwrap());
        assert_eq!(store.get(&p).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn delete_removes_from_either_state() {
        let store = MemoryBlobStore::new();
        let p = path();
        store.put(&p, b"data").await.unwrap();
        store.move_to_trash(&p).await.unwrap();
        store.delete(&p).await.unwrap();
        assert_eq!(store.trashed_len(), 0);
        assert_eq!(store.active_len(), 0);
    }
}
