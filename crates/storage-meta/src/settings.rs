//! Key/value settings bag (SMTP configuration and other admin-tunable state).

use crate::{MetaError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;

/// Fetch a single setting, deserializing its JSON value into `T`.
pub async fn get<T: DeserializeOwned>(pool: &PgPool, key: &str) -> Result<Option<T>> {
    let value: Option<serde_json::Value> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    match value {
        Some(v) => Ok(Some(serde_json::from_value(v).map_err(|e| {
            MetaError::Conflict(format!("malformed setting {key}: {e}"))
        })?)),
        None => Ok(None),
    }
}

/// Insert or overwrite a setting.
pub async fn set<T: Serialize>(pool: &PgPool, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_value(value)
        .map_err(|e| MetaError::Conflict(format!("cannot serialize setting {key}: {e}")))?;
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = now()",
    )
    .bind(key)
    .bind(json)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove a setting.
pub async fn delete(pool: &PgPool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// A content hash of every row, used as a cache-invalidation key by
/// `storage-mail` (so it knows when to rebuild its transport).
pub async fn settings_fingerprint(pool: &PgPool) -> Result<String> {
    use sha2::{Digest, Sha256};

    let rows: Vec<(String, serde_json::Value)> =
        sqlx::query_as("SELECT key, value FROM settings ORDER BY key ASC")
            .fetch_all(pool)
            .await?;
    let joined = rows
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let digest = Sha256::digest(joined.as_bytes());
    Ok(hex::encode(digest))
}
