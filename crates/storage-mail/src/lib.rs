//! # storage-mail
//!
//! SMTP notifications for invitations and password resets. Deliberately
//! thin: no templating engine, no retry queue, no delivery-status tracking
//! (spec §1 non-goals exclude the "SMTP templating layer") — callers render
//! subject/body themselves and hand this crate finished text to send.
//!
//! The one piece of design this crate owns is the transport cache
//! ([`EmailTransport`]): rebuilding a `lettre` SMTP client on every send
//! would mean a fresh TCP+TLS handshake per email, so the client is cached
//! and only rebuilt when [`SmtpSettings`] actually changes.

pub mod error;
pub mod settings;
pub mod transport;

pub use error::{MailError, Result};
pub use settings::SmtpSettings;
pub use transport::EmailTransport;
