//! Error types for the storage-core crate.
//!
//! These are the typed failures the service layer raises (spec §9's
//! "exceptions-for-control-flow → result/error values" redesign); `storage-api`
//! maps each variant to exactly one HTTP status in its own `ApiError`.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the file/share/invitation/auth services.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Request shape/range/regex failure; carries field-level detail.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No session, or a session that no longer resolves to a user.
    #[error("authentication required")]
    AuthRequired,

    /// Role insufficient, CSRF mismatch, wrong share password.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Record missing, expired/revoked share, bad public token.
    #[error("not found")]
    NotFound,

    /// Duplicate content detected on upload; carries up to 10 existing matches.
    #[error("duplicate content detected")]
    DuplicateContent { matches: Vec<Uuid> },

    /// Username/email or share-token collision.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upload admission would exceed the user's quota.
    #[error("storage limit exceeded")]
    QuotaExceeded,

    /// Public or private share is expired, revoked, or its token is unknown.
    #[error("share expired or no longer available")]
    ShareExpired,

    /// Share password missing or incorrect.
    #[error("invalid share credentials")]
    BadShareCredentials,

    /// A caller tripped one of §8's cross-component invariants; this should
    /// never be reachable through normal API use and indicates a bug.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// Public-share abuse limiter or HTTP throttle rejected the request.
    #[error("rate limited: retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Upload body exceeds the 1 GiB ceiling.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Metadata store error.
    #[error("metadata store error: {0}")]
    Meta(#[from] storage_meta::MetaError),

    /// Blob store error.
    #[error("blob store error: {0}")]
    Blob(#[from] storage_blob::BlobError),

    /// Crypto error. AEAD authentication failures land here; the detailed
    /// cause is logged by the caller and never included in the message
    /// returned to a client (spec §7).
    #[error("crypto error: {0}")]
    Crypto(#[from] storage_crypto::CryptoError),

    /// Upstream dependency (SMTP, filesystem free-space probe) unavailable.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}
