//! Private and public file sharing (spec §4.6): creation, settings updates,
//! revocation, and share-gated downloads.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use sqlx::PgPool;
use std::sync::Arc;
use storage_blob::{BlobStore, StoragePath};
use storage_crypto::{hash_password, verify_password, symmetric, Kek};
use storage_meta::files as file_repo;
use storage_meta::models::{FileRecord, Share, SharePermission, User};
use storage_meta::shares::{self as share_repo, NewShare};
use uuid::Uuid;

const TOKEN_BYTES: usize = 16;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 72;

/// Request shape for creating either kind of share.
pub struct CreateShareInput {
    pub file_id: Uuid,
    pub is_public: bool,
    pub permission: SharePermission,
    pub grantee_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub password: Option<String>,
}

/// Request shape for the public-share settings update (spec §4.6 "clear
/// wins over set, within the same request").
pub struct UpdatePublicShareInput {
    pub expires_at: Option<DateTime<Utc>>,
    pub password: Option<String>,
    pub clear_expiry: bool,
    pub clear_password: bool,
}

/// A public share's non-secret metadata, returned to an anonymous caller.
pub struct PublicShareView {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub is_folder: bool,
    pub has_content: bool,
    pub requires_password: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ShareService {
    pool: PgPool,
    blob_store: Arc<dyn BlobStore>,
    kek: Arc<Kek>,
}

impl ShareService {
    pub fn new(pool: PgPool, blob_store: Arc<dyn BlobStore>, kek: Arc<Kek>) -> Self {
        Self { pool, blob_store, kek }
    }

    fn validate_password(password: &str) -> Result<(), CoreError> {
        let len = password.len();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(CoreError::Validation(format!(
                "share password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        hex::encode(bytes)
    }

    async fn mint_unique_token(&self) -> Result<String, CoreError> {
        for _ in 0..8 {
            let token = Self::generate_token();
            if !share_repo::token_exists(&self.pool, &token).await? {
                return Ok(token);
            }
        }
        Err(CoreError::Unavailable("could not mint a unique share token".to_string()))
    }

    /// Create a private (user-to-user) or public (token-based) share.
    pub async fn create(&self, creator: &User, input: CreateShareInput) -> Result<Share, CoreError> {
        let file = file_repo::find_by_id(&self.pool, input.file_id).await.map_err(not_found_or)?;
        if file.owner_id != creator.id {
            return Err(CoreError::Forbidden("not the owner of this file".to_string()));
        }
        if let Some(expires_at) = input.expires_at {
            if expires_at <= Utc::now() {
                return Err(CoreError::Validation("expiry must be in the future".to_string()));
            }
        }

        if input.is_public {
            let password_hash = match input.password {
                Some(password) => {
                    Self::validate_password(&password)?;
                    Some(hash_password(&password)?)
                }
                None => None,
            };
            let token = self.mint_unique_token().await?;
            let share = share_repo::create(
                &self.pool,
                NewShare {
                    file_id: file.id,
                    creator_id: creator.id,
                    grantee_user_id: None,
                    grantee_email: None,
                    share_token: Some(&token),
                    is_public: true,
                    permission: input.permission,
                    expires_at: input.expires_at,
                    password_hash: password_hash.as_deref(),
                },
            )
            .await?;
            Ok(share)
        } else {
            let email = input
                .grantee_email
                .ok_or_else(|| CoreError::Validation("grantee email is required for a private share".to_string()))?;
            if email.eq_ignore_ascii_case(&creator.email) {
                return Err(CoreError::Validation("cannot share a file with yourself".to_string()));
            }
            let grantee = storage_meta::users::find_by_email(&self.pool, &email).await?;
            let share = share_repo::create(
                &self.pool,
                NewShare {
                    file_id: file.id,
                    creator_id: creator.id,
                    grantee_user_id: grantee.as_ref().map(|u| u.id),
                    grantee_email: Some(&email),
                    share_token: None,
                    is_public: false,
                    permission: input.permission,
                    expires_at: input.expires_at,
                    password_hash: None,
                },
            )
            .await?;
            Ok(share)
        }
    }

    /// Files shared with the requester by other users.
    pub async fn list_shared_with_me(&self, user: &User) -> Result<Vec<Share>, CoreError> {
        Ok(share_repo::list_by_grantee(&self.pool, user.id).await?)
    }

    /// Public shares the requester created.
    pub async fn list_my_public_shares(&self, user: &User) -> Result<Vec<Share>, CoreError> {
        let all = share_repo::list_by_creator(&self.pool, user.id).await?;
        Ok(all.into_iter().filter(|s| s.is_public).collect())
    }

    /// Private shares the requester created.
    pub async fn list_my_private_shares(&self, user: &User) -> Result<Vec<Share>, CoreError> {
        let all = share_repo::list_by_creator(&self.pool, user.id).await?;
        Ok(all.into_iter().filter(|s| !s.is_public).collect())
    }

    /// Update a public share's expiry/password; `clear_*` flags win over the
    /// corresponding `Some` value in the same request (spec §4.6).
    pub async fn update_public_settings(
        &self,
        requester: &User,
        share_id: Uuid,
        input: UpdatePublicShareInput,
    ) -> Result<Share, CoreError> {
        let share = share_repo::find_by_id(&self.pool, share_id).await.map_err(not_found_or)?;
        if share.creator_id != requester.id {
            return Err(CoreError::Forbidden("not the creator of this share".to_string()));
        }
        if !share.is_public {
            return Err(CoreError::Validation("not a public share".to_string()));
        }

        let expires_at = if input.clear_expiry {
            None
        } else {
            input.expires_at.or(share.expires_at)
        };
        if let Some(expires_at) = expires_at {
            if expires_at <= Utc::now() {
                return Err(CoreError::Validation("expiry must be in the future".to_string()));
            }
        }

        let password_hash = if input.clear_password {
            None
        } else if let Some(password) = &input.password {
            Self::validate_password(password)?;
            Some(hash_password(password)?)
        } else {
            share.password_hash.clone()
        };

        let updated = share_repo::update_public_settings(&self.pool, share_id, expires_at, password_hash.as_deref())
            .await
            .map_err(not_found_or)?;
        Ok(updated)
    }

    /// Build the fully-qualified public link for a share (spec §6 wire format).
    pub fn public_link(origin: &str, token: &str) -> String {
        format!("{}/share/{}", origin.trim_end_matches('/'), token)
    }

    /// Revoke (delete) a share; only the creator may do this.
    pub async fn revoke(&self, requester: &User, share_id: Uuid) -> Result<(), CoreError> {
        let share = share_repo::find_by_id(&self.pool, share_id).await.map_err(not_found_or)?;
        if share.creator_id != requester.id {
            return Err(CoreError::Forbidden("not the creator of this share".to_string()));
        }
        share_repo::delete(&self.pool, share_id).await?;
        Ok(())
    }

    /// Download through a private share: the grantee must be the requester.
    pub async fn download_private(&self, requester: &User, share_id: Uuid) -> Result<(FileRecord, Vec<u8>), CoreError> {
        let share = share_repo::find_by_id(&self.pool, share_id).await.map_err(not_found_or)?;
        if share.is_public {
            return Err(CoreError::Validation("use the public download endpoint for a public share".to_string()));
        }
        if share.grantee_user_id != Some(requester.id) {
            return Err(CoreError::Forbidden("not the grantee of this share".to_string()));
        }
        if share.is_expired(Utc::now()) {
            return Err(CoreError::ShareExpired);
        }
        let record = file_repo::find_by_id(&self.pool, share.file_id).await.map_err(not_found_or)?;
        let plaintext = self.decrypt(&record).await?;
        Ok((record, plaintext))
    }

    /// Public metadata for an anonymous viewer (spec §4.6 "non-secret
    /// metadata + has_content flag"). Expiry is checked on every read;
    /// an expired share reads as not-found, never as a distinct error.
    /// Password-protected shares gate metadata the same way they gate
    /// download (spec §8 scenario 5: wrong/missing password on a
    /// password-protected share is a 403 here too, not just on download).
    pub async fn public_metadata(&self, token: &str, password: Option<&str>) -> Result<PublicShareView, CoreError> {
        let share = share_repo::find_by_token(&self.pool, token).await.map_err(|_| CoreError::NotFound)?;
        if share.is_expired(Utc::now()) {
            return Err(CoreError::NotFound);
        }
        if let Some(expected) = &share.password_hash {
            let supplied = password.ok_or(CoreError::BadShareCredentials)?;
            if !verify_password(supplied, expected) {
                return Err(CoreError::BadShareCredentials);
            }
        }
        let record = file_repo::find_by_id(&self.pool, share.file_id).await.map_err(|_| CoreError::NotFound)?;
        Ok(PublicShareView {
            file_name: record.name,
            mime_type: record.mime_type,
            size_bytes: record.size_bytes,
            is_folder: record.is_folder,
            has_content: record.storage_path.is_some(),
            requires_password: share.requires_password(),
            expires_at: share.expires_at,
        })
    }

    /// Verify a public share's password (or absence of one) and, on
    /// success, decrypt and return its content. The abuse-limiter
    /// interaction (window cap, failure backoff) is the caller's
    /// responsibility (`storage-api`'s handler), since it is keyed on
    /// client IP, which this layer does not see.
    pub async fn download_public(&self, token: &str, password: Option<&str>) -> Result<(FileRecord, Vec<u8>), CoreError> {
        let share = share_repo::find_by_token(&self.pool, token).await.map_err(|_| CoreError::NotFound)?;
        if share.is_expired(Utc::now()) {
            return Err(CoreError::NotFound);
        }
        if let Some(expected) = &share.password_hash {
            let supplied = password.ok_or(CoreError::BadShareCredentials)?;
            if !verify_password(supplied, expected) {
                return Err(CoreError::BadShareCredentials);
            }
        }
        let record = file_repo::find_by_id(&self.pool, share.file_id).await.map_err(|_| CoreError::NotFound)?;
        let plaintext = self.decrypt(&record).await?;
        Ok((record, plaintext))
    }

    async fn decrypt(&self, record: &FileRecord) -> Result<Vec<u8>, CoreError> {
        if record.is_folder || !record.is_uploaded() {
            return Err(CoreError::NotFound);
        }
        let path = StoragePath::parse(record.storage_path.as_deref().unwrap_or_default())?;
        let ciphertext = self.blob_store.get(&path).await?;
        let dek = self.kek.unwrap_dek(record.wrapped_dek.as_deref().unwrap_or_default())?;
        let nonce = symmetric::Nonce::from_bytes(record.body_iv.as_deref().unwrap_or_default())?;
        Ok(symmetric::decrypt(&dek, &nonce, &ciphertext)?)
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
    fn token_has_expected_length() {
        let token = ShareService::generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn public_link_strips_trailing_slash() {
        assert_eq!(
            ShareService::public_link("https://example.com/", "abc123"),
            "https://example.com/share/abc123"
        );
    }

    #[test]
    fn password_length_bounds() {
        assert!(ShareService::validate_password("short").is_err());
        assert!(ShareService::validate_password("123456").is_ok());
        assert!(ShareService::validate_password(&"a".repeat(73)).is_err());
        assert!(ShareService::validate_password(&"a".repeat(72)).is_ok());
    }
}
