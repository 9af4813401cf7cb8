//! Invitation repository.

use crate::models::{Invitation, InvitationStatus, Role};
use crate::{MetaError, Result};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow)]
struct InvitationRow {
    id: Uuid,
    email: String,
    inviter_id: Uuid,
    token: String,
    role: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = MetaError;

    fn try_from(row: InvitationRow) -> Result<Self> {
        Ok(Invitation {
            id: row.id,
            email: row.email,
            inviter_id: row.inviter_id,
            token: row.token,
            role: Role::parse(&row.role)
                .ok_or_else(|| MetaError::Conflict(format!("unknown role {}", row.role)))?,
            status: InvitationStatus::parse(&row.status)
                .ok_or_else(|| MetaError::Conflict(format!("unknown status {}", row.status)))?,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

const SELECT: &str = "SELECT id, email, inviter_id, token, role, status, created_at, expires_at \
                       FROM invitations";

/// Create an invitation.
pub async fn create(
    pool: &PgPool,
    email: &str,
    inviter_id: Uuid,
    token: &str,
    role: Role,
    expires_at: chrono::DateTime<chrono::Utc>,
) -> Result<Invitation> {
    let row: InvitationRow = sqlx::query_as(
        "INSERT INTO invitations (email, email_lower, inviter_id, token, role, status, expires_at) \
         VALUES ($1, $2, $3, $4, $5, 'pending', $6) RETURNING \
         id, email, inviter_id, token, role, status, created_at, expires_at",
    )
    .bind(email)
    .bind(email.to_lowercase())
    .bind(inviter_id)
    .bind(token)
    .bind(role.as_str())
    .bind(expires_at)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MetaError::Conflict("invitation token collision".to_string())
        }
        _ => MetaError::Database(e),
    })?;
    row.try_into()
}

/// Find the pending invitation addressed to `email`, matched case-insensitively.
pub async fn find_pending_by_email(pool: &PgPool, email: &str) -> Result<Option<Invitation>> {
    let row: Option<InvitationRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE email_lower = $1 AND status = 'pending'"
    ))
    .bind(email.to_lowercase())
    .fetch_optional(pool)
    .await?;
    row.map(TryInto::try_into).transpose()
}

/// Find an invitation by id.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Invitation> {
    let row: InvitationRow = sqlx::query_as(&format!("{SELECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// Find an invitation by its token.
pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Invitation> {
    let row: InvitationRow = sqlx::query_as(&format!("{SELECT} WHERE token = $1"))
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(MetaError::NotFound)?;
    row.try_into()
}

/// List invitations sent by a given inviter (admin/owner management view).
pub async fn list_by_inviter(pool: &PgPool, inviter_id: Uuid) -> Result<Vec<Invitation>> {
    let rows: Vec<InvitationRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE inviter_id = $1 ORDER BY created_at DESC"
    ))
    .bind(inviter_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// List every invitation (owner/admin global view).
pub async fn list_all(pool: &PgPool) -> Result<Vec<Invitation>> {
    let rows: Vec<InvitationRow> = sqlx::query_as(&format!("{SELECT} ORDER BY created_at DESC"))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Transition a pending invitation to `accepted`. The caller pairs this with
/// user creation in the same transaction so the two commit atomically.
pub async fn mark_accepted(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE invitations SET status = 'accepted' WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::Conflict("invitation no longer pending".to_string()));
    }
    Ok(())
}

/// Revoke a pending invitation.
pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE invitations SET status = 'revoked' WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(MetaError::NotFound);
    }
    Ok(())
}

/// Sweep pending invitations whose `expires_at` has passed into `expired`.
/// Safe to call opportunistically (e.g. before redemption checks).
pub async fn expire_stale(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE invitations SET status = 'expired' WHERE status = 'pending' AND expires_at <= now()",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
