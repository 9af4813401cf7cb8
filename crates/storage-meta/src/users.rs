//! User repository.

use crate::models::{Role, User};
use crate::{MetaError, Result};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    used_bytes: i64,
    quota_bytes: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = MetaError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: Role::parse(&row.role)
                .ok_or_else(|| MetaError::Conflict(format!("unknown role {}", row.role)))?,
            used_bytes: row.used_bytes,
            quota_bytes: row.quota_bytes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT: &str = "SELECT id, name, email, password_hash, role, used_bytes, quota_bytes, \
                       created_at, updated_at FROM users";

/// Whether any user exists yet (drives the bootstrap-as-owner path).
pub async fn any_exists(pool: &PgPool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Create a user. The first user in the system must be created with
/// `Role::Owner` by the caller (the auth service enforces this).
pub async fn create(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User> {
    let email_lower = email.to_lowercase();
    let row: UserRow = sqlx::query_as(&format!(
        "INSERT INTO users (name, email, email_lower, password_hash, role) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id, name, email, password_hash, role, \
         used_bytes, quota_bytes, created_at, updated_at"
    ))
    .bind(name)
    .bind(email)
    .bind(&email_lower)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MetaError::Conflict("email already registered".to_string())
        }
        _ => MetaError::Database(e),
    })?;
    row.try_into()
}

/// Find a user by id.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<User> {
    let row: UserRow = sqlx::query_as(&format!("{SELECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// Find a user by case-insensitive email.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT} WHERE email_lower = $1"))
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await?;
    row.map(TryInto::try_into).transpose()
}

/// List every user (admin/storage-overview endpoints).
pub async fn list_all(pool: &PgPool) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!("{SELECT} ORDER BY created_at ASC"))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Update display name.
pub async fn update_name(pool: &PgPool, id: Uuid, name: &str) -> Result<User> {
    let row: UserRow = sqlx::query_as(&format!(
        "UPDATE users SET name = $1, updated_at = now() WHERE id = $2 RETURNING \
         id, name, email, password_hash, role, used_bytes, quota_bytes, created_at, updated_at"
    ))
    .bind(name)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// Update a user's password hash (change-password / reset-password).
pub async fn update_password_hash(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<()> {
    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}

/// Set a user's quota, subject to the caller having already validated the
/// admission rule in §4.4 (not below `used_bytes`, not above available space).
pub async fn set_quota(pool: &PgPool, id: Uuid, quota_bytes: i64) -> Result<User> {
    let row: UserRow = sqlx::query_as(&format!(
        "UPDATE users SET quota_bytes = $1, updated_at = now() WHERE id = $2 RETURNING \
         id, name, email, password_hash, role, used_bytes, quota_bytes, created_at, updated_at"
    ))
    .bind(quota_bytes)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// Change a user's role (admin user-management endpoint).
pub async fn set_role(pool: &PgPool, id: Uuid, role: Role) -> Result<User> {
    let row: UserRow = sqlx::query_as(&format!(
        "UPDATE users SET role = $1, updated_at = now() WHERE id = $2 RETURNING \
         id, name, email, password_hash, role, used_bytes, quota_bytes, created_at, updated_at"
    ))
    .bind(role.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// Adjust `used_bytes` by `delta` (positive or negative) inside an existing
/// transaction, so quota updates stay atomic with the file mutation that
/// caused them.
pub async fn adjust_used_bytes(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    delta: i64,
) -> Result<()> {
    sqlx::query("UPDATE users SET used_bytes = used_bytes + $1, updated_at = now() WHERE id = $2")
        .bind(delta)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Delete a user (admin operation). Cascades to their files via FK.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}
