//! Row types for the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's role. Ordered so `owner > admin > user` is a plain comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Owner,
}

impl Role {
    /// Parse the role column's text representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    /// The role column's text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

/// A registered account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub used_bytes: i64,
    pub quota_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// `quota_bytes == 0` denotes an unlimited quota.
    pub fn is_unlimited(&self) -> bool {
        self.quota_bytes == 0
    }

    /// Whether `additional` more bytes may be admitted under this user's quota.
    pub fn has_room_for(&self, additional: i64) -> bool {
        self.role == Role::Owner || self.is_unlimited() || self.used_bytes + additional <= self.quota_bytes
    }
}

/// A file or folder record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub parent_id: Option<Uuid>,
    pub is_folder: bool,
    pub content_hash: Option<String>,
    pub storage_path: Option<String>,
    pub wrapped_dek: Option<Vec<u8>>,
    pub body_iv: Option<Vec<u8>>,
    pub algorithm: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Whether this record has finished the upload step (all crypto fields present).
    pub fn is_uploaded(&self) -> bool {
        self.storage_path.is_some() && self.wrapped_dek.is_some() && self.body_iv.is_some()
    }

    /// Whether this record is still awaiting its upload.
    pub fn is_pending_upload(&self) -> bool {
        !self.is_folder && !self.is_uploaded()
    }

    /// Whether this record is soft-deleted (trashed).
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Permission granted by a share.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    Read,
    Write,
}

impl SharePermission {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// A private or public share of a file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Share {
    pub id: Uuid,
    pub file_id: Uuid,
    pub creator_id: Uuid,
    pub grantee_user_id: Option<Uuid>,
    pub grantee_email: Option<String>,
    pub share_token: Option<String>,
    pub is_public: bool,
    pub permission: SharePermission,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Share {
    /// Whether the share has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// Whether a password is required to access this share.
    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Invitation status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Revoked,
    Expired,
}

impl InvitationStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "revoked" => Some(Self::Revoked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

/// An invitation to register.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub email: String,
    pub inviter_id: Uuid,
    pub token: String,
    pub role: Role,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    /// Whether this invitation is still redeemable as of `now`.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && self.expires_at > now
    }
}

/// Pagination parameters, clamped server-side.
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    /// Build pagination from raw query values, applying the default and cap.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) * self.limit) as i64
    }

    pub fn limit_i64(&self) -> i64 {
        self.limit as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::User);
    }

    #[test]
    fn pagination_clamps_limit() {
        let p = Pagination::new(Some(1), Some(10_000));
        assert_eq!(p.limit, Pagination::MAX_LIMIT);
    }

    #[test]
    fn pagination_defaults() {
        let p = Pagination::new(None, None);
        assert_eq!(p.limit, Pagination::DEFAULT_LIMIT);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset(), 0);
    }
}
