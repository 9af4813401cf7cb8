//! `storage_path` parsing, the `<owner-id>/<file-id>.enc` locator format
//! persisted on the file record and resolved against the blob store root.

use crate::{BlobError, Result};
use uuid::Uuid;

/// A parsed storage path: owner directory plus file blob id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoragePath {
    owner_id: Uuid,
    file_id: Uuid,
}

impl StoragePath {
    /// Build a storage path for a freshly uploaded blob.
    pub fn new(owner_id: Uuid, file_id: Uuid) -> Self {
        Self { owner_id, file_id }
    }

    /// Parse the persisted `"<owner-id>/<file-id>.enc"` form.
    pub fn parse(s: &str) -> Result<Self> {
        let (owner_part, file_part) = s
            .split_once('/')
            .ok_or_else(|| BlobError::InvalidPath(s.to_string()))?;
        let file_part = file_part
            .strip_suffix(".enc")
            .ok_or_else(|| BlobError::InvalidPath(s.to_string()))?;
        let owner_id =
            Uuid::parse_str(owner_part).map_err(|_| BlobError::InvalidPath(s.to_string()))?;
        let file_id =
            Uuid::parse_str(file_part).map_err(|_| BlobError::InvalidPath(s.to_string()))?;
        Ok(Self { owner_id, file_id })
    }

    /// The owning user's id.
    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    /// The blob's own id (usually the file record's id).
    pub fn file_id(&self) -> Uuid {
        self.file_id
    }

    /// Render the persisted `"<owner-id>/<file-id>.enc"` form.
    pub fn to_storage_string(&self) -> String {
        format!("{}/{}.enc", self.owner_id, self.file_id)
    }

    /// Relative path of the active blob under the store root.
    pub fn active_rel_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.owner_id.to_string()).join(format!("{}.enc", self.file_id))
    }

    /// Relative path of the trashed blob under the store root.
    pub fn trash_rel_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.owner_id.to_string())
            .join(".trash")
            .join(format!("{}.enc", self.file_id))
    }
}

impl std::fmt::Display for StoragePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_storage_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let owner = Uuid::new_v4();
        let file = Uuid::new_v4();
        let path = StoragePath::new(owner, file);
        let parsed = StoragePath::parse(&path.to_storage_string()).unwrap();
        assert_eq!(path, parsed);
    }

    #[test]
    fn rejects_missing_extension() {
        let owner = Uuid::new_v4();
        let file = Uuid::new_v4();
        assert!(StoragePath::parse(&format!("{owner}/{file}")).is_err());
    }

    #[test]
    fn rejects_malformed_uuid() {
        assert!(StoragePath::parse("not-a-uuid/also-not-a-uuid.enc").is_err());
    }

    #[test]
    fn trash_path_is_namespaced_per_owner() {
        let owner = Uuid::new_v4();
        let file = Uuid::new_v4();
        let path = StoragePath::new(owner, file);
        assert!(path.trash_rel_path().starts_with(owner.to_string()));
        assert!(path.trash_rel_path().to_string_lossy().contains(".trash"));
    }
}
