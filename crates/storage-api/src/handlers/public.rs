//! `/public/share/:token` handlers: anonymous metadata + download, gated by
//! the in-process abuse limiter and the public-share rate limiter (spec §4.8).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use storage_core::LimiterDecision;

use crate::error::ApiError;
use crate::handlers::content_disposition;
use crate::middleware::{extract_ip, rate_limit_key};
use crate::state::AppState;

fn share_password(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Share-Password")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[derive(Serialize)]
pub struct PublicShareMetadata {
    #[serde(rename = "fileName")]
    file_name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "sizeBytes")]
    size_bytes: i64,
    #[serde(rename = "isFolder")]
    is_folder: bool,
    #[serde(rename = "hasContent")]
    has_content: bool,
    #[serde(rename = "requiresPassword")]
    requires_password: bool,
    #[serde(rename = "expiresAt")]
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn public_metadata(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<Json<PublicShareMetadata>, ApiError> {
    let ip = extract_ip(Some(addr), &headers, state.config.trust_proxy);
    rate_limit_key(&state.rate_limiters.public_share, &ip.to_string()).await?;

    if let LimiterDecision::Blocked { retry_after_secs } = state.limiter.check(ip, &token) {
        return Err(ApiError::RateLimited { retry_after_secs });
    }

    let password = share_password(&headers);
    let result = state.shares.public_metadata(&token, password.as_deref()).await;
    match result {
        Ok(view) => {
            state.limiter.record_success(ip, &token);
            Ok(Json(PublicShareMetadata {
                file_name: view.file_name,
                mime_type: view.mime_type,
                size_bytes: view.size_bytes,
                is_folder: view.is_folder,
                has_content: view.has_content,
                requires_password: view.requires_password,
                expires_at: view.expires_at,
            }))
        }
        Err(e) => {
            if matches!(e, storage_core::CoreError::BadShareCredentials) {
                state.limiter.record_failure(ip, &token);
            }
            Err(e.into())
        }
    }
}

pub async fn public_download(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let ip = extract_ip(Some(addr), &headers, state.config.trust_proxy);
    rate_limit_key(&state.rate_limiters.public_share, &ip.to_string()).await?;

    if let LimiterDecision::Blocked { retry_after_secs } = state.limiter.check(ip, &token) {
        return Err(ApiError::RateLimited { retry_after_secs });
    }

    let password = share_password(&headers);
    match state.shares.download_public(&token, password.as_deref()).await {
        Ok((record, plaintext)) => {
            state.limiter.record_success(ip, &token);
            Ok((
                [
                    (header::CONTENT_TYPE, record.mime_type.clone()),
                    (header::CONTENT_DISPOSITION, content_disposition(&record.name)),
                ],
                plaintext,
            )
                .into_response())
        }
        Err(e) => {
            if matches!(e, storage_core::CoreError::BadShareCredentials) {
                state.limiter.record_failure(ip, &token);
            }
            Err(e.into())
        }
    }
}
