//! # storage-core
//!
//! The service layer: file/folder orchestration, sharing, invitations,
//! authentication business rules, quota accounting, and the public-share
//! abuse limiter (spec §4.4-§4.8). Each service is generic only insofar as
//! it holds a `sqlx::PgPool` (via `storage-meta`), a `storage-blob::BlobStore`,
//! and `storage-crypto`'s `Kek` — no generic backend parameter, since this
//! system has exactly one metadata store and one blob store implementation
//! in production (tests substitute `storage-blob::MemoryBlobStore` and a
//! throwaway Postgres database, not a different trait impl).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           storage-api (HTTP)             │
//! ├──────────┬──────────┬──────────┬────────┤
//! │FileService│ShareSvc │AuthService│InviteSvc│
//! ├──────────┴──────────┴──────────┴────────┤
//! │   QuotaAccountant    │   AbuseLimiter    │
//! ├─────────────────────┬────────────────────┤
//! │   storage-meta       │   storage-blob    │
//! └─────────────────────┴────────────────────┘
//! ```

pub mod auth;
pub mod error;
pub mod files;
pub mod invitations;
pub mod limiter;
pub mod quota;
pub mod shares;
pub mod validation;

pub use auth::AuthService;
pub use error::{CoreError, Result};
pub use files::{CreateFileInput, FileService};
pub use invitations::InvitationService;
pub use limiter::{AbuseLimiter, LimiterDecision};
pub use quota::QuotaAccountant;
pub use shares::{CreateShareInput, PublicShareView, ShareService, UpdatePublicShareInput};

/// Version of the storage format
pub const STORAGE_VERSION: &str = "1.0.0";
