//! Share repository: private (user-to-user) and public (token-based) shares.

use crate::models::{Share, SharePermission};
use crate::{MetaError, Result};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow)]
struct ShareRow {
    id: Uuid,
    file_id: Uuid,
    creator_id: Uuid,
    grantee_user_id: Option<Uuid>,
    grantee_email: Option<String>,
    share_token: Option<String>,
    is_public: bool,
    permission: String,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    password_hash: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ShareRow> for Share {
    type Error = MetaError;

    fn try_from(row: ShareRow) -> Result<Self> {
        Ok(Share {
            id: row.id,
            file_id: row.file_id,
            creator_id: row.creator_id,
            grantee_user_id: row.grantee_user_id,
            grantee_email: row.grantee_email,
            share_token: row.share_token,
            is_public: row.is_public,
            permission: SharePermission::parse(&row.permission)
                .ok_or_else(|| MetaError::Conflict(format!("unknown permission {}", row.permission)))?,
            expires_at: row.expires_at,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

const SELECT: &str = "SELECT id, file_id, creator_id, grantee_user_id, grantee_email, \
                       share_token, is_public, permission, expires_at, password_hash, created_at \
                       FROM shares";

/// Fields accepted when creating a share (private or public).
pub struct NewShare<'a> {
    pub file_id: Uuid,
    pub creator_id: Uuid,
    pub grantee_user_id: Option<Uuid>,
    pub grantee_email: Option<&'a str>,
    pub share_token: Option<&'a str>,
    pub is_public: bool,
    pub permission: SharePermission,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub password_hash: Option<&'a str>,
}

/// Create a share.
pub async fn create(pool: &PgPool, new: NewShare<'_>) -> Result<Share> {
    let row: ShareRow = sqlx::query_as(
        "INSERT INTO shares (file_id, creator_id, grantee_user_id, grantee_email, share_token, \
         is_public, permission, expires_at, password_hash) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING \
         id, file_id, creator_id, grantee_user_id, grantee_email, share_token, is_public, \
         permission, expires_at, password_hash, created_at",
    )
    .bind(new.file_id)
    .bind(new.creator_id)
    .bind(new.grantee_user_id)
    .bind(new.grantee_email)
    .bind(new.share_token)
    .bind(new.is_public)
    .bind(new.permission.as_str())
    .bind(new.expires_at)
    .bind(new.password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MetaError::Conflict("share token collision".to_string())
        }
        _ => MetaError::Database(e),
    })?;
    row.try_into()
}

/// Find a share by id.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Share> {
    let row: ShareRow = sqlx::query_as(&format!("{SELECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// Find a public share by its token.
pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Share> {
    let row: ShareRow = sqlx::query_as(&format!("{SELECT} WHERE share_token = $1"))
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// All shares attached to a file (owner's management view).
pub async fn list_by_file(pool: &PgPool, file_id: Uuid) -> Result<Vec<Share>> {
    let rows: Vec<ShareRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE file_id = $1 ORDER BY created_at DESC"
    ))
    .bind(file_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// All shares created by a given user, across every file they own (their
/// "my public shares" / "my private shares" management views).
pub async fn list_by_creator(pool: &PgPool, creator_id: Uuid) -> Result<Vec<Share>> {
    let rows: Vec<ShareRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE creator_id = $1 ORDER BY created_at DESC"
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Private shares granted to a specific user (their "shared with me" view).
pub async fn list_by_grantee(pool: &PgPool, grantee_user_id: Uuid) -> Result<Vec<Share>> {
    let rows: Vec<ShareRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE grantee_user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(grantee_user_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Pending shares addressed to an email that has not yet claimed an account,
/// used to attach them once that email registers.
pub async fn list_by_email(pool: &PgPool, email: &str) -> Result<Vec<Share>> {
    let rows: Vec<ShareRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE grantee_email = $1 AND grantee_user_id IS NULL ORDER BY created_at DESC"
    ))
    .bind(email.to_lowercase())
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Attach a pending email-addressed share to a user id once they register.
pub async fn claim_for_user(pool: &PgPool, share_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE shares SET grantee_user_id = $1 WHERE id = $2")
        .bind(user_id)
        .bind(share_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Update a public share's expiry and/or password (owner management endpoint).
pub async fn update_public_settings(
    pool: &PgPool,
    id: Uuid,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    password_hash: Option<&str>,
) -> Result<Share> {
    let row: ShareRow = sqlx::query_as(
        "UPDATE shares SET expires_at = $1, password_hash = $2 WHERE id = $3 RETURNING \
         id, file_id, creator_id, grantee_user_id, grantee_email, share_token, is_public, \
         permission, expires_at, password_hash, created_at",
    )
    .bind(expires_at)
    .bind(password_hash)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// Revoke (delete) a share.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM shares WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}

/// Whether `token` is already in use (used while minting new tokens to retry
/// on the astronomically unlikely collision).
pub async fn token_exists(pool: &PgPool, token: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM shares WHERE share_token = $1")
        .bind(token)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}
