//! `/files/:id/share`, `/files/shared`, `/files/shares/*` handlers (spec §6, §4.6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use storage_core::{CreateShareInput, UpdatePublicShareInput};
use storage_meta::models::SharePermission;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{content_disposition, ShareDto};
use crate::state::AppState;

fn request_origin(state: &AppState, headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.frontend_url.clone())
}

#[derive(Deserialize)]
pub struct CreateShareBody {
    #[serde(rename = "isPublic", default)]
    is_public: bool,
    #[serde(default = "default_permission")]
    permission: String,
    #[serde(rename = "granteeEmail")]
    grantee_email: Option<String>,
    #[serde(rename = "expiresAt")]
    expires_at: Option<DateTime<Utc>>,
    password: Option<String>,
}

fn default_permission() -> String {
    "read".to_string()
}

fn parse_permission(raw: &str) -> Result<SharePermission, ApiError> {
    SharePermission::parse(raw).ok_or_else(|| ApiError::Validation(format!("unknown permission \"{raw}\"")))
}

pub async fn create_share(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    Path(file_id): Path<Uuid>,
    Json(body): Json<CreateShareBody>,
) -> Result<Json<ShareDto>, ApiError> {
    let permission = parse_permission(&body.permission)?;
    let share = state
        .shares
        .create(
            &user,
            CreateShareInput {
                file_id,
                is_public: body.is_public,
                permission,
                grantee_email: body.grantee_email,
                expires_at: body.expires_at,
                password: body.password,
            },
        )
        .await?;
    let origin = request_origin(&state, &headers);
    Ok(Json(ShareDto::from_share(&share, &origin)))
}

pub async fn list_shared_with_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ShareDto>>, ApiError> {
    let origin = request_origin(&state, &headers);
    let shares = state.shares.list_shared_with_me(&user).await?;
    Ok(Json(shares.iter().map(|s| ShareDto::from_share(s, &origin)).collect()))
}

pub async fn list_public_shares(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ShareDto>>, ApiError> {
    let origin = request_origin(&state, &headers);
    let shares = state.shares.list_my_public_shares(&user).await?;
    Ok(Json(shares.iter().map(|s| ShareDto::from_share(s, &origin)).collect()))
}

pub async fn list_private_shares(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ShareDto>>, ApiError> {
    let origin = request_origin(&state, &headers);
    let shares = state.shares.list_my_private_shares(&user).await?;
    Ok(Json(shares.iter().map(|s| ShareDto::from_share(s, &origin)).collect()))
}

#[derive(Deserialize)]
pub struct UpdatePublicSettingsBody {
    #[serde(rename = "expiresAt")]
    expires_at: Option<DateTime<Utc>>,
    password: Option<String>,
    #[serde(rename = "clearPassword", default)]
    clear_password: bool,
    #[serde(rename = "clearExpiry", default)]
    clear_expiry: bool,
}

pub async fn update_public_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    Path(share_id): Path<Uuid>,
    Json(body): Json<UpdatePublicSettingsBody>,
) -> Result<Json<ShareDto>, ApiError> {
    let share = state
        .shares
        .update_public_settings(
            &user,
            share_id,
            UpdatePublicShareInput {
                expires_at: body.expires_at,
                password: body.password,
                clear_expiry: body.clear_expiry,
                clear_password: body.clear_password,
            },
        )
        .await?;
    let origin = request_origin(&state, &headers);
    Ok(Json(ShareDto::from_share(&share, &origin)))
}

pub async fn revoke(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(share_id): Path<Uuid>,
) -> Result<(), ApiError> {
    state.shares.revoke(&user, share_id).await?;
    Ok(())
}

pub async fn download_private(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(share_id): Path<Uuid>,
) -> Result<axum::response::Response, ApiError> {
    let (record, plaintext) = state.shares.download_private(&user, share_id).await?;
    Ok((
        [
            (axum::http::header::CONTENT_TYPE, record.mime_type.clone()),
            (axum::http::header::CONTENT_DISPOSITION, content_disposition(&record.name)),
        ],
        plaintext,
    )
        .into_response())
}
