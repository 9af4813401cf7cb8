//! Invitation business rules (spec §4.7 "Invite-gated registration" and
//! "Role hierarchy and invite authority"): creation, listing, revocation,
//! and token validation ahead of registration.

use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use sqlx::PgPool;
use storage_meta::invitations::{self as invite_repo};
use storage_meta::models::{Invitation, Role, User};
use uuid::Uuid;

const TOKEN_BYTES: usize = 16;

#[derive(Clone)]
pub struct InvitationService {
    pool: PgPool,
    default_ttl_hours: i64,
}

impl InvitationService {
    pub fn new(pool: PgPool, default_ttl_hours: i64) -> Self {
        Self { pool, default_ttl_hours }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        hex::encode(bytes)
    }

    /// Create an invitation. The inviter cannot invite at a role strictly
    /// above their own (spec §4.7, §8: "only owners may invite admins or
    /// owners").
    pub async fn create(&self, inviter: &User, email: &str, role: Role) -> Result<Invitation, CoreError> {
        if role > inviter.role {
            return Err(CoreError::Forbidden(
                "cannot invite a role above your own".to_string(),
            ));
        }
        if inviter.role != Role::Owner && role >= Role::Admin {
            return Err(CoreError::Forbidden(
                "only owners may invite admins or owners".to_string(),
            ));
        }
        if let Some(existing) = invite_repo::find_pending_by_email(&self.pool, email).await? {
            if existing.is_redeemable(Utc::now()) {
                return Err(CoreError::Conflict(
                    "a pending invitation already exists for this email".to_string(),
                ));
            }
        }
        let token = Self::generate_token();
        let expires_at = Utc::now() + Duration::hours(self.default_ttl_hours);
        let invitation = invite_repo::create(&self.pool, email, inviter.id, &token, role, expires_at).await?;
        Ok(invitation)
    }

    /// Invitations sent by `inviter` (owners/admins see their own sent list
    /// through the same endpoint; a full-system view is a separate method).
    pub async fn list_sent_by(&self, inviter: &User) -> Result<Vec<Invitation>, CoreError> {
        Ok(invite_repo::list_by_inviter(&self.pool, inviter.id).await?)
    }

    /// Every invitation in the system (owner/admin global view).
    pub async fn list_all(&self) -> Result<Vec<Invitation>, CoreError> {
        Ok(invite_repo::list_all(&self.pool).await?)
    }

    /// Revoke a pending invitation; only its inviter (or any owner) may revoke it.
    pub async fn revoke(&self, requester: &User, invitation_id: Uuid) -> Result<(), CoreError> {
        let invitation = invite_repo::find_by_id(&self.pool, invitation_id).await.map_err(not_found_or)?;
        if invitation.inviter_id != requester.id && requester.role != Role::Owner {
            return Err(CoreError::Forbidden("not the inviter of this invitation".to_string()));
        }
        invite_repo::revoke(&self.pool, invitation.id).await.map_err(not_found_or)?;
        Ok(())
    }

    /// Validate a token ahead of registration, without consuming it.
    pub async fn validate(&self, token: &str) -> Result<Invitation, CoreError> {
        invite_repo::expire_stale(&self.pool).await?;
        let invitation = invite_repo::find_by_token(&self.pool, token).await.map_err(not_found_or)?;
        if !invitation.is_redeemable(Utc::now()) {
            return Err(CoreError::ShareExpired);
        }
        Ok(invitation)
    }

    /// Validate that `email` matches `token`'s invitation, case-insensitively
    /// (spec §4.7's registration gate). Does not consume the token; the
    /// auth service transitions it to `accepted` atomically with user
    /// creation.
    pub async fn validate_for_registration(&self, token: &str, email: &str) -> Result<Invitation, CoreError> {
        let invitation = self.validate(token).await?;
        if !invitation.email.eq_ignore_ascii_case(email) {
            return Err(CoreError::Forbidden(
                "invitation email does not match the submitted email".to_string(),
            ));
        }
        Ok(invitation)
    }

    pub fn default_expiry(&self) -> DateTime<Utc> {
        Utc::now() + Duration::hours(self.default_ttl_hours)
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
    fn token_length() {
        let token = InvitationService::generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
    }

    #[test]
    fn role_ordering_for_invite_authority() {
        assert!(Role::Admin < Role::Owner);
        assert!(Role::User < Role::Admin);
    }
}
