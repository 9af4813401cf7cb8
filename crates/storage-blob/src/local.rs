//! Filesystem-backed `BlobStore`. Every blob lives under a single root `R`;
//! writes go to a temp file in the same directory, fsync, then rename, so a
//! reader never observes a partially written blob and a crash mid-write
//! leaves the previous contents (or nothing) intact, never a torn file.

use crate::{BlobError, BlobStore, Result, StoragePath};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A blob store rooted at a directory on the local filesystem.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Open (and create, if missing) a blob store at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn active_path(&self, path: &StoragePath) -> PathBuf {
        self.root.join(path.active_rel_path())
    }

    fn trash_path(&self, path: &StoragePath) -> PathBuf {
        self.root.join(path.trash_rel_path())
    }

    async fn atomic_write(&self, dest: PathBuf, data: Vec<u8>) -> Result<()> {
        let parent = dest
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| BlobError::InvalidPath(dest.display().to_string()))?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&parent)?;
            set_dir_permissions(&parent)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            tmp.write_all(&data)?;
            tmp.flush()?;
            tmp.as_file().sync_all()?;
            tmp.persist(&dest).map_err(|e| e.error)?;
            set_file_permissions(&dest)?;
            Ok(())
        })
        .await
        .expect("blocking blob write task panicked")
    }

    async fn move_file(&self, from: PathBuf, to: PathBuf) -> Result<()> {
        tokio::task::spawn_blocking(move || -> Result<()> {
            if !from.exists() {
                return Err(BlobError::NotFound(from.display().to_string()));
            }
            let parent = to
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| BlobError::InvalidPath(to.display().to_string()))?;
            std::fs::create_dir_all(&parent)?;
            set_dir_permissions(&parent)?;
            std::fs::rename(&from, &to)?;
            Ok(())
        })
        .await
        .expect("blocking blob move task panicked")
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &StoragePath, data: &[u8]) -> Result<()> {
        self.atomic_write(self.active_path(path), data.to_vec()).await
    }

    async fn get(&self, path: &StoragePath) -> Result<Vec<u8>> {
        let active = self.active_path(path);
        match tokio::fs::read(&active).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_storage_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.active_path(path)).await?)
    }

    async fn move_to_trash(&self, path: &StoragePath) -> Result<()> {
        self.move_file(self.active_path(path), self.trash_path(path)).await
    }

    async fn restore_from_trash(&self, path: &StoragePath) -> Result<()> {
        self.move_file(self.trash_path(path), self.active_path(path)).await
    }

    async fn delete(&self, path: &StoragePath) -> Result<()> {
        let active = self.active_path(path);
        let trashed = self.trash_path(path);
        let mut found = false;
        if tokio::fs::try_exists(&active).await? {
            tokio::fs::remove_file(&active).await?;
            found = true;
        }
        if tokio::fs::try_exists(&trashed).await? {
            tokio::fs::remove_file(&trashed).await?;
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(BlobError::NotFound(path.to_storage_string()))
        }
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
    async fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let p = path();
        store.put(&p, b"ciphertext bytes").await.unwrap();
        assert_eq!(store.get(&p).await.unwrap(), b"ciphertext bytes");
    }

    #[tokio::test]
    async fn get_missing_blob_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(matches!(store.get(&path()).await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn trash_then_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let p = path();
        store.put(&p, b"data").await.unwrap();

        store.move_to_trash(&p).await.unwrap();
        assert!(!store.exists(&p).await.unwrap());

        store.restore_from_trash(&p).await.unwrap();
        assert!(store.exists(&p).await.unwrap());
        assert_eq!(store.get(&p).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn overwrite_replaces_contents_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let p = path();
        store.put(&p, b"first").await.unwrap();
        store.put(&p, b"second").await.unwrap();
        assert_eq!(store.get(&p).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn delete_removes_active_and_trashed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let p = path();
        store.put(&p, b"data").await.unwrap();
        store.delete(&p).await.unwrap();
        assert!(!store.exists(&p).await.unwrap());
        assert!(matches!(store.delete(&p).await, Err(BlobError::NotFound(_))));
    }
}
