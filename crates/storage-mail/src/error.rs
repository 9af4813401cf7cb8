//! Error types for the storage-mail crate

use thiserror::Error;

/// Result type alias using `MailError`
pub type Result<T> = std::result::Result<T, MailError>;

/// Errors surfaced by the SMTP transport layer.
#[derive(Error, Debug)]
pub enum MailError {
    /// The message body could not be built (bad address, empty subject, etc).
    #[error("failed to build message: {0}")]
    Build(String),

    /// The transport could not be constructed from the configured settings.
    #[error("failed to build SMTP transport: {0}")]
    Transport(String),

    /// The SMTP server rejected the message or the connection failed.
    #[error("failed to send mail: {0}")]
    Send(String),

    /// Email is administratively disabled (`EMAIL_ENABLED=false`); callers
    /// should treat this as a no-op, not an error, except in `/settings/smtp/test`
    /// where it is surfaced directly.
    #[error("email sending is disabled")]
    Disabled,
}
