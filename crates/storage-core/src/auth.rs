//! Authentication business rules (spec §4.7): bootstrap/invite-gated
//! registration, login, change-password, forgot/reset-password. Session
//! construction (JWT, cookies) is `storage-api`'s concern; this module only
//! touches passwords, invitations, and user rows.

use crate::error::CoreError;
use crate::invitations::InvitationService;
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use sqlx::PgPool;
use storage_crypto::{hash_password, verify_password};
use storage_meta::models::{Role, User};
use storage_meta::{invitations as invite_repo, password_reset, users};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const RESET_TOKEN_BYTES: usize = 24;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    invitations: InvitationService,
    public_registration: bool,
}

impl AuthService {
    pub fn new(pool: PgPool, invitations: InvitationService, public_registration: bool) -> Self {
        Self { pool, invitations, public_registration }
    }

    fn validate_password(password: &str) -> Result<(), CoreError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Whether the system still needs its first (owner) account (spec §4.7
    /// "Bootstrap", surfaced at `GET /auth/setup-status`).
    pub async fn needs_setup(&self) -> Result<bool, CoreError> {
        Ok(!users::any_exists(&self.pool).await?)
    }

    /// Register a new account: the first user in the system becomes owner
    /// unconditionally; every subsequent registration needs either a valid
    /// invitation or, if enabled, `PUBLIC_REGISTRATION`.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        invite_token: Option<&str>,
    ) -> Result<User, CoreError> {
        Self::validate_password(password)?;
        let bootstrap = !users::any_exists(&self.pool).await?;
        let password_hash = hash_password(password)?;

        if bootstrap {
            let user = users::create(&self.pool, name, email, &password_hash, Role::Owner).await?;
            return Ok(user);
        }

        match invite_token {
            Some(token) => {
                let invitation = self.invitations.validate_for_registration(token, email).await?;
                let mut tx = self.pool.begin().await.map_err(storage_meta::MetaError::from)?;
                invite_repo::mark_accepted(&mut tx, invitation.id).await?;
                let user = create_user_in_tx(&mut tx, name, email, &password_hash, invitation.role).await?;
                tx.commit().await.map_err(storage_meta::MetaError::from)?;
                Ok(user)
            }
            None if self.public_registration => {
                let user = users::create(&self.pool, name, email, &password_hash, Role::User).await?;
                Ok(user)
            }
            None => Err(CoreError::Forbidden(
                "registration requires a valid invitation".to_string(),
            )),
        }
    }

    /// Verify email/password and return the user on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, CoreError> {
        let user = users::find_by_email(&self.pool, email)
            .await?
            .ok_or(CoreError::Forbidden("invalid email or password".to_string()))?;
        if !verify_password(password, &user.password_hash) {
            return Err(CoreError::Forbidden("invalid email or password".to_string()));
        }
        Ok(user)
    }

    /// Update display name.
    pub async fn update_profile(&self, user_id: Uuid, name: &str) -> Result<User, CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("name must not be empty".to_string()));
        }
        Ok(users::update_name(&self.pool, user_id, name.trim()).await?)
    }

    /// Change password: requires the current password to verify first.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), CoreError> {
        Self::validate_password(new_password)?;
        let user = users::find_by_id(&self.pool, user_id).await?;
        if !verify_password(current_password, &user.password_hash) {
            return Err(CoreError::Forbidden("current password is incorrect".to_string()));
        }
        let new_hash = hash_password(new_password)?;
        users::update_password_hash(&self.pool, user_id, &new_hash).await?;
        Ok(())
    }

    /// Issue a reset token iff the account exists; always returns `Ok(())`
    /// regardless, so the HTTP layer can return the same opaque response
    /// either way (spec §4.7 enumeration resistance). `email_enabled`
    /// gates whether anything is actually sent; the token is still minted
    /// so the rest of the flow is exercised uniformly.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<(User, String)>, CoreError> {
        let Some(user) = users::find_by_email(&self.pool, email).await? else {
            return Ok(None);
        };
        password_reset::delete_for_user(&self.pool, user.id).await?;
        let token = Self::generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        password_reset::create(&self.pool, &token, user.id, expires_at).await?;
        Ok(Some((user, token)))
    }

    /// Consume a reset token and set a new password.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), CoreError> {
        Self::validate_password(new_password)?;
        let record = password_reset::find(&self.pool, token)
            .await?
            .ok_or(CoreError::BadShareCredentials)?;
        if record.expires_at <= Utc::now() {
            password_reset::consume(&self.pool, token).await.ok();
            return Err(CoreError::BadShareCredentials);
        }
        let new_hash = hash_password(new_password)?;
        users::update_password_hash(&self.pool, record.user_id, &new_hash).await?;
        password_reset::consume(&self.pool, token).await?;
        Ok(())
    }

    fn generate_reset_token() -> String {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        hex::encode(bytes)
    }
}

async fn create_user_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, CoreError> {
    let email_lower = email.to_lowercase();
    #[derive(sqlx::FromRow)]
    struct Row {
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
    let row: Row = sqlx::query_as(
        "INSERT INTO users (name, email, email_lower, password_hash, role) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id, name, email, password_hash, role, \
         used_bytes, quota_bytes, created_at, updated_at",
    )
    .bind(name)
    .bind(email)
    .bind(&email_lower)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            storage_meta::MetaError::Conflict("email already registered".to_string())
        }
        _ => storage_meta::MetaError::Database(e),
    })?;
    Ok(User {
        id: row.id,
        name: row.name,
        email: row.email,
        password_hash: row.password_hash,
        role: Role::parse(&row.role).ok_or_else(|| {
            CoreError::InvariantViolated(format!("unknown role {}", row.role))
        })?,
        used_bytes: row.used_bytes,
        quota_bytes: row.quota_bytes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_length_enforced() {
        assert!(AuthService::validate_password("short1").is_err());
        assert!(AuthService::validate_password("longenough1").is_ok());
    }

    #[test]
    fn reset_token_length() {
        let token = AuthService::generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_BYTES * 2);
    }
}
