//! HTTP error shaping (spec §7). Keeps the teacher's funnel pattern — one
//! `ApiError` enum, `#[from]` conversions from every inner crate's error
//! type, a single mapping to `(StatusCode, &'static str)` — but renders a
//! JSON body instead of the teacher's S3 XML `<Error>` document.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Taxonomy of error codes returned to clients (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    AuthRequired,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    RateLimited,
    Server,
    Unavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::AuthRequired => "auth-required",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::PayloadTooLarge => "payload-too-large",
            Self::RateLimited => "rate-limited",
            Self::Server => "server",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::AuthRequired => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Server => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// The API's error type. Converts from every inner crate's error via
/// `#[from]`, mirroring `fula-cli::error::ApiError`'s original funnel shape.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("{0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("internal error")]
    Internal(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Core(#[from] storage_core::CoreError),

    #[error(transparent)]
    Mail(#[from] storage_mail::MailError),

    /// Raised by handlers that query `storage-meta` directly (admin user
    /// management has no `storage-core` service of its own to funnel
    /// through).
    #[error(transparent)]
    Meta(#[from] storage_meta::MetaError),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::AuthRequired => ErrorCode::AuthRequired,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::NotFound => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::PayloadTooLarge => ErrorCode::PayloadTooLarge,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::Internal(_) => ErrorCode::Server,
            Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::Mail(_) => ErrorCode::Unavailable,
            Self::Core(e) => core_error_code(e),
            Self::Meta(e) => meta_error_code(e),
        }
    }
}

fn meta_error_code(e: &storage_meta::MetaError) -> ErrorCode {
    match e {
        storage_meta::MetaError::NotFound => ErrorCode::NotFound,
        storage_meta::MetaError::Conflict(_) => ErrorCode::Conflict,
        storage_meta::MetaError::Database(_) | storage_meta::MetaError::Migration(_) => ErrorCode::Server,
    }
}

fn core_error_code(e: &storage_core::CoreError) -> ErrorCode {
    use storage_core::CoreError::*;
    match e {
        Validation(_) => ErrorCode::Validation,
        AuthRequired => ErrorCode::AuthRequired,
        Forbidden(_) => ErrorCode::Forbidden,
        NotFound => ErrorCode::NotFound,
        DuplicateContent { .. } | Conflict(_) => ErrorCode::Conflict,
        QuotaExceeded => ErrorCode::Validation,
        ShareExpired => ErrorCode::NotFound,
        BadShareCredentials => ErrorCode::Forbidden,
        InvariantViolated(_) => ErrorCode::Server,
        RateLimited { .. } => ErrorCode::RateLimited,
        PayloadTooLarge => ErrorCode::PayloadTooLarge,
        Meta(_) | Blob(_) | Crypto(_) => ErrorCode::Server,
        Unavailable(_) => ErrorCode::Unavailable,
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "statusCode")]
    status_code: u16,
    message: String,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = code.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let message = match &self {
            // crypto/AEAD failures never surface their raw cause (spec §7).
            Self::Core(storage_core::CoreError::Crypto(_)) => {
                "an internal error occurred".to_string()
            }
            Self::Internal(_) => "an internal error occurred".to_string(),
            Self::Meta(storage_meta::MetaError::Database(_)) | Self::Meta(storage_meta::MetaError::Migration(_)) => {
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let details = match &self {
            Self::Core(storage_core::CoreError::DuplicateContent { matches }) => {
                Some(serde_json::json!({ "matches": matches }))
            }
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody {
                status_code: status.as_u16(),
                message,
                error_code: Some(code.as_str()),
                details,
            }),
        )
            .into_response();

        if let Self::RateLimited { retry_after_secs } = &self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}
