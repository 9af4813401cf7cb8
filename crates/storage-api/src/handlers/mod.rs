//! Request handlers and their wire-format DTOs (spec §6). Internal models
//! (`storage_meta::models`) stay snake_case Rust structs; every handler maps
//! them through an explicit `*Dto` before serializing, instead of deriving
//! `rename_all = "camelCase"` on the domain types themselves — the same
//! split `fula-cli`'s handlers draw between `ObjectMetadata` and its XML
//! wire representation.

pub mod admin;
pub mod auth;
pub mod files;
pub mod invites;
pub mod public;
pub mod settings;
pub mod shares;
pub mod storage;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use storage_meta::models::{FileRecord, Invitation, Pagination, Share, User};
use uuid::Uuid;

/// A page of results plus the total matching count (spec §6 "paginated file
/// list" and friends).
#[derive(Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Raw pagination query parameters; clamped via [`Pagination::new`].
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn into_pagination(self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

/// A user as returned over the wire: never the password hash.
#[derive(Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    #[serde(rename = "usedBytes")]
    pub used_bytes: i64,
    #[serde(rename = "quotaBytes")]
    pub quota_bytes: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserDto {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role.as_str(),
            used_bytes: u.used_bytes,
            quota_bytes: u.quota_bytes,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self::from(&u)
    }
}

/// A file or folder record as returned over the wire.
#[derive(Serialize)]
pub struct FileRecordDto {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: i64,
    #[serde(rename = "parentId")]
    pub parent_id: Option<Uuid>,
    #[serde(rename = "isFolder")]
    pub is_folder: bool,
    #[serde(rename = "fileHash")]
    pub content_hash: Option<String>,
    #[serde(rename = "isUploaded")]
    pub is_uploaded: bool,
    #[serde(rename = "deletedAt")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "uploadUrl", skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

impl From<&FileRecord> for FileRecordDto {
    fn from(f: &FileRecord) -> Self {
        let upload_url = (!f.is_folder && !f.is_uploaded()).then(|| format!("/api/v1/files/{}/upload", f.id));
        Self {
            id: f.id,
            name: f.name.clone(),
            mime_type: f.mime_type.clone(),
            size_bytes: f.size_bytes,
            parent_id: f.parent_id,
            is_folder: f.is_folder,
            content_hash: f.content_hash.clone(),
            is_uploaded: f.is_uploaded(),
            deleted_at: f.deleted_at,
            created_at: f.created_at,
            updated_at: f.updated_at,
            upload_url,
        }
    }
}

impl From<FileRecord> for FileRecordDto {
    fn from(f: FileRecord) -> Self {
        Self::from(&f)
    }
}

/// A share as returned over the wire. `publicLink` is only populated for
/// public shares, by the caller, since building it needs the request origin.
#[derive(Serialize)]
pub struct ShareDto {
    pub id: Uuid,
    #[serde(rename = "fileId")]
    pub file_id: Uuid,
    #[serde(rename = "isPublic")]
    pub is_public: bool,
    pub permission: &'static str,
    #[serde(rename = "granteeEmail")]
    pub grantee_email: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "requiresPassword")]
    pub requires_password: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "publicLink", skip_serializing_if = "Option::is_none")]
    pub public_link: Option<String>,
}

impl ShareDto {
    pub fn from_share(s: &Share, origin: &str) -> Self {
        let public_link = s
            .share_token
            .as_deref()
            .map(|token| storage_core::ShareService::public_link(origin, token));
        Self {
            id: s.id,
            file_id: s.file_id,
            is_public: s.is_public,
            permission: s.permission.as_str(),
            grantee_email: s.grantee_email.clone(),
            expires_at: s.expires_at,
            requires_password: s.requires_password(),
            created_at: s.created_at,
            public_link,
        }
    }
}

/// An invitation as returned over the wire.
#[derive(Serialize)]
pub struct InvitationDto {
    pub id: Uuid,
    pub email: String,
    pub role: &'static str,
    pub status: &'static str,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

impl From<&Invitation> for InvitationDto {
    fn from(i: &Invitation) -> Self {
        Self {
            id: i.id,
            email: i.email.clone(),
            role: i.role.as_str(),
            status: i.status.as_str(),
            created_at: i.created_at,
            expires_at: i.expires_at,
        }
    }
}

/// Build a `Content-Disposition: attachment` header value carrying both the
/// ASCII `filename=` fallback and the RFC 5987 `filename*=UTF-8''...` form
/// (spec §6 "wire artifacts").
pub fn content_disposition(name: &str) -> String {
    let ascii_fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let encoded = utf8_percent_encode(name, NON_ALPHANUMERIC).to_string();
    format!("attachment; filename=\"{ascii_fallback}\"; filename*=UTF-8''{encoded}")
}
