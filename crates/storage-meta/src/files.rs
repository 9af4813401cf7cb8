//! File/folder record repository. Quota-delta bookkeeping for the
//! transactional units in §4.3 lives in `storage-core::files`, which drives
//! these functions inside its own transactions.

use crate::models::{FileRecord, Pagination};
use crate::{MetaError, Result};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(FromRow)]
struct FileRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    mime_type: String,
    size_bytes: i64,
    parent_id: Option<Uuid>,
    is_folder: bool,
    content_hash: Option<String>,
    storage_path: Option<String>,
    wrapped_dek: Option<Vec<u8>>,
    body_iv: Option<Vec<u8>>,
    algorithm: Option<String>,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            parent_id: row.parent_id,
            is_folder: row.is_folder,
            content_hash: row.content_hash,
            storage_path: row.storage_path,
            wrapped_dek: row.wrapped_dek,
            body_iv: row.body_iv,
            algorithm: row.algorithm,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT: &str = "SELECT id, owner_id, name, mime_type, size_bytes, parent_id, is_folder, \
                       content_hash, storage_path, wrapped_dek, body_iv, algorithm, deleted_at, \
                       created_at, updated_at FROM files";

/// Fields accepted when creating a pending (or already-linked, for dedup) record.
pub struct NewFile<'a> {
    pub owner_id: Uuid,
    pub name: &'a str,
    pub mime_type: &'a str,
    pub size_bytes: i64,
    pub parent_id: Option<Uuid>,
    pub is_folder: bool,
    pub content_hash: Option<&'a str>,
    pub storage_path: Option<&'a str>,
    pub wrapped_dek: Option<&'a [u8]>,
    pub body_iv: Option<&'a [u8]>,
    pub algorithm: Option<&'a str>,
}

/// Create a file/folder record inside an existing transaction (the caller
/// pairs this with a quota-delta update, per §4.3's "one transaction" rule).
pub async fn create(tx: &mut Transaction<'_, Postgres>, new: NewFile<'_>) -> Result<FileRecord> {
    let row: FileRow = sqlx::query_as(&format!(
        "INSERT INTO files (owner_id, name, mime_type, size_bytes, parent_id, is_folder, \
         content_hash, storage_path, wrapped_dek, body_iv, algorithm) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING \
         id, owner_id, name, mime_type, size_bytes, parent_id, is_folder, content_hash, \
         storage_path, wrapped_dek, body_iv, algorithm, deleted_at, created_at, updated_at"
    ))
    .bind(new.owner_id)
    .bind(new.name)
    .bind(new.mime_type)
    .bind(new.size_bytes)
    .bind(new.parent_id)
    .bind(new.is_folder)
    .bind(new.content_hash)
    .bind(new.storage_path)
    .bind(new.wrapped_dek)
    .bind(new.body_iv)
    .bind(new.algorithm)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.into())
}

/// Look a record up by id, regardless of trash state.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<FileRecord> {
    let row: FileRow = sqlx::query_as(&format!("{SELECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(MetaError::NotFound)?;
    Ok(row.into())
}

/// Same lookup, but inside a transaction (used by the delete/trash paths so
/// the reference-count check below reads a consistent snapshot).
pub async fn find_by_id_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<FileRecord> {
    let row: FileRow = sqlx::query_as(&format!("{SELECT} WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(MetaError::NotFound)?;
    Ok(row.into())
}

/// Paginated, searchable listing within a parent folder (or root).
pub async fn list(
    pool: &PgPool,
    owner_id: Uuid,
    parent_id: Option<Uuid>,
    search: Option<&str>,
    pagination: Pagination,
) -> Result<Vec<FileRecord>> {
    let like = search.map(|s| format!("%{s}%"));
    let rows: Vec<FileRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE owner_id = $1 AND deleted_at IS NULL \
         AND ($2::uuid IS NULL AND parent_id IS NULL OR parent_id = $2) \
         AND ($3::text IS NULL OR name ILIKE $3) \
         ORDER BY is_folder DESC, created_at DESC \
         LIMIT $4 OFFSET $5"
    ))
    .bind(owner_id)
    .bind(parent_id)
    .bind(like)
    .bind(pagination.limit_i64())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Total count matching [`list`]'s filter, for pagination metadata.
pub async fn count(
    pool: &PgPool,
    owner_id: Uuid,
    parent_id: Option<Uuid>,
    search: Option<&str>,
) -> Result<i64> {
    let like = search.map(|s| format!("%{s}%"));
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM files WHERE owner_id = $1 AND deleted_at IS NULL \
         AND ($2::uuid IS NULL AND parent_id IS NULL OR parent_id = $2) \
         AND ($3::text IS NULL OR name ILIKE $3)",
    )
    .bind(owner_id)
    .bind(parent_id)
    .bind(like)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Total count of trashed records for a user, for pagination metadata.
pub async fn count_trash(pool: &PgPool, owner_id: Uuid) -> Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM files WHERE owner_id = $1 AND deleted_at IS NOT NULL")
        .bind(owner_id)
        .fetch_one(pool)
        .await
        .map_err(MetaError::from)
}

/// All active direct children of `parent_id` (or root, if `None`), with no
/// pagination — used by the file service's depth-first folder walk (folder
/// size computation, ZIP archive streaming), which needs every descendant,
/// not a page of them.
pub async fn list_children_all(
    pool: &PgPool,
    owner_id: Uuid,
    parent_id: Option<Uuid>,
) -> Result<Vec<FileRecord>> {
    let rows: Vec<FileRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE owner_id = $1 AND deleted_at IS NULL \
         AND ($2::uuid IS NULL AND parent_id IS NULL OR parent_id = $2) \
         ORDER BY is_folder DESC, name ASC"
    ))
    .bind(owner_id)
    .bind(parent_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Trashed records for a user (the trash listing endpoint).
pub async fn list_trash(pool: &PgPool, owner_id: Uuid, pagination: Pagination) -> Result<Vec<FileRecord>> {
    let rows: Vec<FileRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE owner_id = $1 AND deleted_at IS NOT NULL \
         ORDER BY deleted_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(owner_id)
    .bind(pagination.limit_i64())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Find non-deleted records owned by `owner_id` sharing `content_hash`, used
/// by the dedup-on-upload path. Capped at 10 to match the "up to 10 existing
/// matches" conflict payload in §4.5.
pub async fn find_by_content_hash(
    pool: &PgPool,
    owner_id: Uuid,
    content_hash: &str,
) -> Result<Vec<FileRecord>> {
    let rows: Vec<FileRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE owner_id = $1 AND deleted_at IS NULL AND content_hash = $2 LIMIT 10"
    ))
    .bind(owner_id)
    .bind(content_hash)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Other active records (any owner) sharing `storage_path`, used to decide
/// whether a blob move/delete is safe. Must be called inside the same
/// transaction that will mutate `id`'s row (§4.5 concurrency rule).
pub async fn count_other_active_references(
    tx: &mut Transaction<'_, Postgres>,
    storage_path: &str,
    excluding_id: Uuid,
) -> Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM files WHERE storage_path = $1 AND id != $2 AND deleted_at IS NULL",
    )
    .bind(storage_path)
    .bind(excluding_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(MetaError::from)
}

/// Any other record at all (active or trashed) sharing `storage_path`,
/// used by permanent-delete to decide whether the blob itself can go.
pub async fn count_other_references(
    tx: &mut Transaction<'_, Postgres>,
    storage_path: &str,
    excluding_id: Uuid,
) -> Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM files WHERE storage_path = $1 AND id != $2")
        .bind(storage_path)
        .bind(excluding_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(MetaError::from)
}

/// Rename a record after re-validation.
pub async fn rename(pool: &PgPool, id: Uuid, name: &str) -> Result<FileRecord> {
    let row: FileRow = sqlx::query_as(&format!(
        "UPDATE files SET name = $1, updated_at = now() WHERE id = $2 RETURNING \
         id, owner_id, name, mime_type, size_bytes, parent_id, is_folder, content_hash, \
         storage_path, wrapped_dek, body_iv, algorithm, deleted_at, created_at, updated_at"
    ))
    .bind(name)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(MetaError::NotFound)?;
    Ok(row.into())
}

/// Fill in the crypto/storage fields once the content upload completes.
pub async fn mark_uploaded(
    pool: &PgPool,
    id: Uuid,
    storage_path: &str,
    wrapped_dek: &[u8],
    body_iv: &[u8],
    algorithm: &str,
) -> Result<FileRecord> {
    let row: FileRow = sqlx::query_as(&format!(
        "UPDATE files SET storage_path = $1, wrapped_dek = $2, body_iv = $3, algorithm = $4, \
         updated_at = now() WHERE id = $5 RETURNING \
         id, owner_id, name, mime_type, size_bytes, parent_id, is_folder, content_hash, \
         storage_path, wrapped_dek, body_iv, algorithm, deleted_at, created_at, updated_at"
    ))
    .bind(storage_path)
    .bind(wrapped_dek)
    .bind(body_iv)
    .bind(algorithm)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(MetaError::NotFound)?;
    Ok(row.into())
}

/// Set `deleted_at` (soft-delete) inside a transaction.
pub async fn soft_delete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE files SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}

/// Clear `deleted_at` (restore) inside a transaction.
pub async fn restore(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE files SET deleted_at = NULL, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}

/// Reverse a soft-delete whose blob move failed after commit (§4.3
/// best-effort compensation path).
pub async fn clear_deleted_at(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE files SET deleted_at = NULL, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove the record entirely (permanent delete) inside a transaction.
pub async fn delete_permanently(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM files WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}

/// All trashed records for a user, for the "empty trash" batch operation.
pub async fn list_trash_for_empty(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
) -> Result<Vec<FileRecord>> {
    let rows: Vec<FileRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE owner_id = $1 AND deleted_at IS NOT NULL FOR UPDATE"
    ))
    .bind(owner_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
