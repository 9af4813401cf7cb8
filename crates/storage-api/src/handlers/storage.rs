//! `/storage/*` handlers: system-wide and per-user storage accounting
//! (spec §6, §4.4). Role-gated to admins and owners.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use storage_meta::models::Role;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::UserDto;
use crate::state::AppState;

fn require_admin(role: Role) -> Result<(), ApiError> {
    if role >= Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin role required".to_string()))
    }
}

#[derive(Serialize)]
pub struct StorageOverview {
    #[serde(rename = "totalUsedBytes")]
    total_used_bytes: i64,
    #[serde(rename = "totalQuotaBytes")]
    total_quota_bytes: i64,
    #[serde(rename = "freeSpaceBytes")]
    free_space_bytes: u64,
    #[serde(rename = "userCount")]
    user_count: usize,
}

pub async fn overview(State(state): State<Arc<AppState>>, AuthUser(user): AuthUser) -> Result<Json<StorageOverview>, ApiError> {
    require_admin(user.role)?;
    let users = storage_meta::users::list_all(&state.pool).await?;
    let free_space_bytes = state.quota.free_space_bytes()?;
    Ok(Json(StorageOverview {
        total_used_bytes: users.iter().map(|u| u.used_bytes).sum(),
        total_quota_bytes: users.iter().map(|u| u.quota_bytes).sum(),
        free_space_bytes,
        user_count: users.len(),
    }))
}

pub async fn list_users(State(state): State<Arc<AppState>>, AuthUser(user): AuthUser) -> Result<Json<Vec<UserDto>>, ApiError> {
    require_admin(user.role)?;
    let users = storage_meta::users::list_all(&state.pool).await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

pub async fn user_detail(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDto>, ApiError> {
    require_admin(user.role)?;
    let target = storage_meta::users::find_by_id(&state.pool, id).await?;
    Ok(Json(UserDto::from(target)))
}

#[derive(Deserialize)]
pub struct UpdateQuotaBody {
    #[serde(rename = "quotaBytes")]
    quota_bytes: i64,
}

pub async fn update_quota(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateQuotaBody>,
) -> Result<Json<UserDto>, ApiError> {
    require_admin(requester.role)?;
    let target = storage_meta::users::find_by_id(&state.pool, id).await?;
    state.quota.validate_quota_change(&target, body.quota_bytes)?;
    let updated = storage_meta::users::set_quota(&state.pool, id, body.quota_bytes).await?;
    Ok(Json(UserDto::from(updated)))
}
