//! File/folder orchestration (spec §4.5): create/upload/download/rename/
//! trash/restore/permanent-delete, deduplication, folder traversal and ZIP
//! streaming. Every operation that mutates both a file record and the
//! owner's `used_bytes` runs inside a single `storage-meta` transaction,
//! per spec §4.3's atomic-unit rules.

use crate::error::CoreError;
use crate::quota::QuotaAccountant;
use crate::validation;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use sqlx::PgPool;
use std::sync::Arc;
use storage_blob::{BlobStore, StoragePath};
use storage_crypto::{keys::DekKey, symmetric, Kek};
use storage_meta::files::{self as file_repo, NewFile};
use storage_meta::models::{FileRecord, Pagination, Role, User};
use storage_meta::users;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024; // 1 GiB
const MAX_DUPLICATE_MATCHES: usize = 10;
const ALGORITHM: &str = "AES-256-GCM";

/// Request shape for pre-upload file/folder creation (spec §4.5 "Create").
pub struct CreateFileInput {
    pub name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub parent_id: Option<Uuid>,
    pub is_folder: bool,
    pub content_hash: Option<String>,
    pub skip_duplicate_check: bool,
}

/// The file service: orchestrates `storage-meta` + `storage-blob` +
/// `storage-crypto` behind the invariants of spec §4.5.
#[derive(Clone)]
pub struct FileService {
    pool: PgPool,
    blob_store: Arc<dyn BlobStore>,
    kek: Arc<Kek>,
    quota: QuotaAccountant,
}

impl FileService {
    pub fn new(pool: PgPool, blob_store: Arc<dyn BlobStore>, kek: Arc<Kek>, quota: QuotaAccountant) -> Self {
        Self { pool, blob_store, kek, quota }
    }

    fn require_owner(file: &FileRecord, requester: &User) -> Result<(), CoreError> {
        if file.owner_id != requester.id {
            return Err(CoreError::Forbidden("not the owner of this file".to_string()));
        }
        Ok(())
    }

    /// Create a pending file record, or a folder, applying validation,
    /// quota admission, and the deduplication policy.
    pub async fn create(&self, owner: &User, input: CreateFileInput) -> Result<FileRecord, CoreError> {
        validation::validate_name(&input.name)?;
        if input.is_folder {
            let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
            let record = file_repo::create(
                &mut tx,
                NewFile {
                    owner_id: owner.id,
                    name: &input.name,
                    mime_type: "application/x-directory",
                    size_bytes: 0,
                    parent_id: input.parent_id,
                    is_folder: true,
                    content_hash: None,
                    storage_path: None,
                    wrapped_dek: None,
                    body_iv: None,
                    algorithm: None,
                },
            )
            .await?;
            tx.commit().await.map_err(storage_meta::MetaError::from)?;
            return Ok(record);
        }

        validation::validate_mime(&input.mime_type)?;
        if input.size_bytes < 0 {
            return Err(CoreError::Validation("size must not be negative".to_string()));
        }

        let dedup_candidate = input.content_hash.as_deref().filter(|_| validation::is_dedup_eligible(&input.name));
        if let Some(hash) = dedup_candidate {
            validation::validate_content_hash(hash)?;
        }

        if let Some(hash) = dedup_candidate {
            let matches = file_repo::find_by_content_hash(&self.pool, owner.id, hash).await?;
            if !matches.is_empty() {
                if !input.skip_duplicate_check {
                    return Err(CoreError::DuplicateContent {
                        matches: matches.iter().take(MAX_DUPLICATE_MATCHES).map(|f| f.id).collect(),
                    });
                }
                if let Some(source) = matches.iter().find(|f| f.is_uploaded()) {
                    // Link to the existing blob: no new bytes, no quota charge.
                    let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
                    let record = file_repo::create(
                        &mut tx,
                        NewFile {
                            owner_id: owner.id,
                            name: &input.name,
                            mime_type: &input.mime_type,
                            size_bytes: input.size_bytes,
                            parent_id: input.parent_id,
                            is_folder: false,
                            content_hash: Some(hash),
                            storage_path: source.storage_path.as_deref(),
                            wrapped_dek: source.wrapped_dek.as_deref(),
                            body_iv: source.body_iv.as_deref(),
                            algorithm: source.algorithm.as_deref(),
                        },
                    )
                    .await?;
                    tx.commit().await.map_err(storage_meta::MetaError::from)?;
                    return Ok(record);
                }
            }
        }

        self.quota.admit(owner, input.size_bytes)?;

        let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
        let record = file_repo::create(
            &mut tx,
            NewFile {
                owner_id: owner.id,
                name: &input.name,
                mime_type: &input.mime_type,
                size_bytes: input.size_bytes,
                parent_id: input.parent_id,
                is_folder: false,
                content_hash: dedup_candidate,
                storage_path: None,
                wrapped_dek: None,
                body_iv: None,
                algorithm: None,
            },
        )
        .await?;
        users::adjust_used_bytes(&mut tx, owner.id, input.size_bytes).await?;
        tx.commit().await.map_err(storage_meta::MetaError::from)?;
        Ok(record)
    }

    /// Check for existing duplicates without creating anything (the
    /// standalone `/files/check-duplicate` endpoint).
    pub async fn check_duplicate(
        &self,
        owner: &User,
        file_hash: &str,
        file_name: Option<&str>,
    ) -> Result<Vec<FileRecord>, CoreError> {
        validation::validate_content_hash(file_hash)?;
        if let Some(name) = file_name {
            if !validation::is_dedup_eligible(name) {
                return Ok(Vec::new());
            }
        }
        let matches = file_repo::find_by_content_hash(&self.pool, owner.id, file_hash).await?;
        Ok(matches.into_iter().take(MAX_DUPLICATE_MATCHES).collect())
    }

    /// Upload content for a pending (non-folder, not-yet-uploaded) record.
    pub async fn upload(&self, requester: &User, file_id: Uuid, bytes: Vec<u8>) -> Result<FileRecord, CoreError> {
        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(CoreError::PayloadTooLarge);
        }
        let record = file_repo::find_by_id(&self.pool, file_id).await.map_err(not_found_or)?;
        Self::require_owner(&record, requester)?;
        if record.is_folder {
            return Err(CoreError::Validation("cannot upload content to a folder".to_string()));
        }
        if record.is_uploaded() {
            return Err(CoreError::Conflict("file already has content".to_string()));
        }

        let dek = DekKey::generate();
        let (nonce, ciphertext) = symmetric::encrypt(&dek, &bytes)?;
        let wrapped_dek = self.kek.wrap(&dek)?;

        let storage_path = StoragePath::new(record.owner_id, record.id);
        self.blob_store.put(&storage_path, &ciphertext).await?;

        let updated = file_repo::mark_uploaded(
            &self.pool,
            file_id,
            &storage_path.to_storage_string(),
            &wrapped_dek,
            nonce.as_bytes(),
            ALGORITHM,
        )
        .await
        .map_err(not_found_or)?;
        Ok(updated)
    }

    /// Decrypt and return a single file's content.
    pub async fn download(&self, requester: &User, file_id: Uuid) -> Result<(FileRecord, Vec<u8>), CoreError> {
        let record = file_repo::find_by_id(&self.pool, file_id).await.map_err(not_found_or)?;
        Self::require_owner(&record, requester)?;
        let plaintext = self.decrypt_record(&record).await?;
        Ok((record, plaintext))
    }

    async fn decrypt_record(&self, record: &FileRecord) -> Result<Vec<u8>, CoreError> {
        if record.is_folder {
            return Err(CoreError::Validation("folders have no content; use the archive download".to_string()));
        }
        if !record.is_uploaded() {
            return Err(CoreError::NotFound);
        }
        let path = StoragePath::parse(record.storage_path.as_deref().unwrap_or_default())?;
        let ciphertext = self.blob_store.get(&path).await?;
        let dek = self.kek.unwrap_dek(record.wrapped_dek.as_deref().unwrap_or_default())?;
        let nonce = storage_crypto::symmetric::Nonce::from_bytes(record.body_iv.as_deref().unwrap_or_default())?;
        let plaintext = symmetric::decrypt(&dek, &nonce, &ciphertext)?;
        Ok(plaintext)
    }

    /// Stream a ZIP archive of a folder's active descendants (spec §4.5
    /// "Folder download"). Built in memory via `async_zip`; each entry is
    /// decrypted one at a time so only one file's plaintext is live at once.
    /// TODO: pipe the `ZipFileWriter` directly into the response body
    /// instead of returning a fully materialized buffer here.
    pub async fn folder_zip(&self, requester: &User, folder_id: Uuid) -> Result<(String, Vec<u8>), CoreError> {
        let folder = file_repo::find_by_id(&self.pool, folder_id).await.map_err(not_found_or)?;
        Self::require_owner(&folder, requester)?;
        if !folder.is_folder {
            return Err(CoreError::Validation("not a folder".to_string()));
        }

        let mut buffer = Vec::new();
        {
            let mut writer = ZipFileWriter::with_tokio(&mut buffer);
            let mut stack: Vec<(Option<Uuid>, String)> = vec![(Some(folder_id), String::new())];
            while let Some((parent_id, prefix)) = stack.pop() {
                let children = file_repo::list_children_all(&self.pool, requester.id, parent_id).await?;
                for child in children {
                    let rel_name = format!("{prefix}{}", child.name);
                    if child.is_folder {
                        stack.push((Some(child.id), format!("{rel_name}/")));
                    } else if child.is_uploaded() {
                        let plaintext = self.decrypt_record(&child).await?;
                        let entry = ZipEntryBuilder::new(rel_name.into(), Compression::Deflate);
                        writer
                            .write_entry_whole(entry, &plaintext)
                            .await
                            .map_err(|e| CoreError::Unavailable(format!("zip write failed: {e}")))?;
                    }
                }
            }
            writer.close().await.map_err(|e| CoreError::Unavailable(format!("zip close failed: {e}")))?;
        }
        Ok((format!("{}.zip", folder.name), buffer))
    }

    /// Recompute a folder's logical size as the sum of its active
    /// descendant files (spec §3: "computed, not stored").
    pub async fn folder_size(&self, owner_id: Uuid, folder_id: Uuid) -> Result<i64, CoreError> {
        let mut total = 0i64;
        let mut stack = vec![Some(folder_id)];
        while let Some(parent_id) = stack.pop() {
            let children = file_repo::list_children_all(&self.pool, owner_id, parent_id).await?;
            for child in children {
                if child.is_folder {
                    stack.push(Some(child.id));
                } else {
                    total += child.size_bytes;
                }
            }
        }
        Ok(total)
    }

    /// Paginated, searchable listing, with folder sizes computed in place.
    pub async fn list(
        &self,
        owner: &User,
        parent_id: Option<Uuid>,
        search: Option<&str>,
        pagination: Pagination,
    ) -> Result<(Vec<FileRecord>, i64), CoreError> {
        let mut items = file_repo::list(&self.pool, owner.id, parent_id, search, pagination).await?;
        let total = file_repo::count(&self.pool, owner.id, parent_id, search).await?;
        for item in items.iter_mut().filter(|f| f.is_folder) {
            item.size_bytes = self.folder_size(owner.id, item.id).await?;
        }
        Ok((items, total))
    }

    /// Trashed records for a user.
    pub async fn list_trash(&self, owner: &User, pagination: Pagination) -> Result<(Vec<FileRecord>, i64), CoreError> {
        let items = file_repo::list_trash(&self.pool, owner.id, pagination).await?;
        let total = file_repo::count_trash(&self.pool, owner.id).await?;
        Ok((items, total))
    }

    /// Rename a file or folder after re-validation.
    pub async fn rename(&self, requester: &User, file_id: Uuid, new_name: &str) -> Result<FileRecord, CoreError> {
        validation::validate_name(new_name)?;
        let record = file_repo::find_by_id(&self.pool, file_id).await.map_err(not_found_or)?;
        Self::require_owner(&record, requester)?;
        let updated = file_repo::rename(&self.pool, file_id, new_name).await.map_err(not_found_or)?;
        Ok(updated)
    }

    /// Soft-delete: set `deleted_at`, then move the blob to trash iff this
    /// was the last active reference (spec §4.5 "Soft-delete").
    pub async fn soft_delete(&self, requester: &User, file_id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
        let record = file_repo::find_by_id_tx(&mut tx, file_id).await.map_err(not_found_or)?;
        Self::require_owner(&record, requester)?;
        if record.is_trashed() {
            tx.commit().await.map_err(storage_meta::MetaError::from)?;
            return Ok(());
        }

        let last_reference = match &record.storage_path {
            Some(path) => file_repo::count_other_active_references(&mut tx, path, file_id).await? == 0,
            None => false,
        };
        file_repo::soft_delete(&mut tx, file_id).await?;
        tx.commit().await.map_err(storage_meta::MetaError::from)?;

        if last_reference {
            if let Some(path) = &record.storage_path {
                let parsed = StoragePath::parse(path)?;
                if let Err(e) = self.blob_store.move_to_trash(&parsed).await {
                    tracing::error!(file_id = %file_id, error = %e, "blob move-to-trash failed after commit; reverting deleted_at");
                    let _ = file_repo::clear_deleted_at(&self.pool, file_id).await;
                    return Err(CoreError::Unavailable("failed to move blob to trash".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Bulk soft-delete; each id is processed independently so one failure
    /// doesn't block the rest.
    pub async fn bulk_soft_delete(&self, requester: &User, ids: &[Uuid]) -> Vec<(Uuid, Result<(), CoreError>)> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            results.push((id, self.soft_delete(requester, id).await));
        }
        results
    }

    /// Restore: clear `deleted_at`, then move the blob back from trash iff
    /// this is the only reference currently pointing at it.
    pub async fn restore(&self, requester: &User, file_id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
        let record = file_repo::find_by_id_tx(&mut tx, file_id).await.map_err(not_found_or)?;
        Self::require_owner(&record, requester)?;
        if !record.is_trashed() {
            tx.commit().await.map_err(storage_meta::MetaError::from)?;
            return Ok(());
        }

        let needs_restore = match &record.storage_path {
            Some(path) => file_repo::count_other_active_references(&mut tx, path, file_id).await? == 0,
            None => false,
        };
        file_repo::restore(&mut tx, file_id).await?;
        tx.commit().await.map_err(storage_meta::MetaError::from)?;

        if needs_restore {
            if let Some(path) = &record.storage_path {
                let parsed = StoragePath::parse(path)?;
                self.blob_store.restore_from_trash(&parsed).await?;
            }
        }
        Ok(())
    }

    /// Permanently delete a record: remove it, delete the blob and
    /// decrement quota iff no other record (active or trashed) references it.
    pub async fn permanent_delete(&self, requester: &User, file_id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
        let record = file_repo::find_by_id_tx(&mut tx, file_id).await.map_err(not_found_or)?;
        Self::require_owner(&record, requester)?;

        let last_reference = match &record.storage_path {
            Some(path) => file_repo::count_other_references(&mut tx, path, file_id).await? == 0,
            None => true,
        };
        file_repo::delete_permanently(&mut tx, file_id).await?;
        if last_reference && !record.is_folder {
            users::adjust_used_bytes(&mut tx, requester.id, -record.size_bytes).await?;
        }
        tx.commit().await.map_err(storage_meta::MetaError::from)?;

        if last_reference {
            if let Some(path) = &record.storage_path {
                let parsed = StoragePath::parse(path)?;
                self.blob_store.delete(&parsed).await?;
            }
        }
        Ok(())
    }

    /// Batch variant of permanent-delete for every trashed record owned by
    /// `owner`; the quota delta is aggregated into a single update.
    pub async fn empty_trash(&self, owner: &User) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
        let trashed = file_repo::list_trash_for_empty(&mut tx, owner.id).await?;

        let mut to_delete_blobs = Vec::new();
        let mut total_delta = 0i64;
        for record in &trashed {
            let last_reference = match &record.storage_path {
                Some(path) => file_repo::count_other_references(&mut tx, path, record.id).await? == 0,
                None => true,
            };
            file_repo::delete_permanently(&mut tx, record.id).await?;
            if last_reference {
                if let Some(path) = &record.storage_path {
                    to_delete_blobs.push(path.clone());
                }
                if !record.is_folder {
                    total_delta -= record.size_bytes;
                }
            }
        }
        if total_delta != 0 {
            users::adjust_used_bytes(&mut tx, owner.id, total_delta).await?;
        }
        tx.commit().await.map_err(storage_meta::MetaError::from)?;

        for path in to_delete_blobs {
            let parsed = StoragePath::parse(&path)?;
            self.blob_store.delete(&parsed).await?;
        }
        Ok(())
    }
}

fn not_found_or(e: storage_meta::MetaError) -> CoreError {
    match e {
        storage_meta::MetaError::NotFound => CoreError::NotFound,
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_upload_bytes_is_one_gib() {
        assert_eq!(MAX_UPLOAD_BYTES, 1 << 30);
    }
}
