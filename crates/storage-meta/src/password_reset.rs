//! Single-use password reset token repository (spec §4.7 "Password reset").

use crate::{MetaError, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A password-reset token row.
pub struct PasswordResetToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issue a token for `user_id`, valid until `expires_at`.
pub async fn create(pool: &PgPool, token: &str, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(token)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Look up a token, if present, regardless of expiry (the caller checks that).
pub async fn find(pool: &PgPool, token: &str) -> Result<Option<PasswordResetToken>> {
    let row: Option<(String, Uuid, DateTime<Utc>)> = sqlx::query_as(
        "SELECT token, user_id, expires_at FROM password_reset_tokens WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(token, user_id, expires_at)| PasswordResetToken { token, user_id, expires_at }))
}

/// Consume (delete) a token once it has been used, successfully or not —
/// single-use regardless of outcome.
pub async fn consume(pool: &PgPool, token: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM password_reset_tokens WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}

/// Remove any existing tokens for a user before issuing a fresh one, so a
/// user never has more than one live reset token outstanding.
pub async fn delete_for_user(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
