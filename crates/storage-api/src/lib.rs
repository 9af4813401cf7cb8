//! # storage-api
//!
//! HTTP surface for the storage service: routing, JWT session cookies, CSRF
//! and rate-limit middleware, and the request handlers that translate
//! `storage-core`'s services into the JSON API of spec §6.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     HTTP clients                       │
//! └─────────────────────────┬───────────────────────────────┘
//! ┌─────────────────────────▼───────────────────────────────┐
//! │                      storage-api                         │
//! │  routes → middleware (session/CSRF/rate-limit) →         │
//! │  handlers (auth/files/shares/public/invites/admin/        │
//! │  storage/settings)                                         │
//! ├───────────────────────────────────────────────────────┤
//! │                      storage-core                        │
//! │   FileService / ShareService / AuthService / ...           │
//! ├──────────────────────┬──────────────────┬──────────────┤
//! │       storage-meta     │   storage-blob    │ storage-mail │
//! └──────────────────────┴──────────────────┴──────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use server::run_server;
pub use state::AppState;
