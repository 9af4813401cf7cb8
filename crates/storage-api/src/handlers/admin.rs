//! `/admin/users/*` handlers: user management for admins and owners (spec §6).
//! Role-change authority mirrors invitation authority (spec §4.7): nobody may
//! grant or act on a role above their own, and only an owner may touch another
//! owner.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
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

pub async fn list_users(State(state): State<Arc<AppState>>, AuthUser(user): AuthUser) -> Result<Json<Vec<UserDto>>, ApiError> {
    require_admin(user.role)?;
    let users = storage_meta::users::list_all(&state.pool).await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

#[derive(Deserialize)]
pub struct UpdateUserBody {
    name: Option<String>,
    role: Option<String>,
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<UserDto>, ApiError> {
    require_admin(requester.role)?;
    let target = storage_meta::users::find_by_id(&state.pool, id).await?;
    if target.role > requester.role {
        return Err(ApiError::Forbidden("cannot modify a user above your own role".to_string()));
    }

    let mut current = target;
    if let Some(name) = &body.name {
        current = storage_meta::users::update_name(&state.pool, id, name).await?;
    }
    if let Some(raw_role) = &body.role {
        let role = Role::parse(raw_role).ok_or_else(|| ApiError::Validation(format!("unknown role \"{raw_role}\"")))?;
        if role > requester.role {
            return Err(ApiError::Forbidden("cannot grant a role above your own".to_string()));
        }
        if requester.role != Role::Owner && role >= Role::Admin {
            return Err(ApiError::Forbidden("only an owner may grant admin or owner".to_string()));
        }
        current = storage_meta::users::set_role(&state.pool, id, role).await?;
    }
    Ok(Json(UserDto::from(current)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(), ApiError> {
    require_admin(requester.role)?;
    if id == requester.id {
        return Err(ApiError::Validation("cannot delete your own account".to_string()));
    }
    let target = storage_meta::users::find_by_id(&state.pool, id).await?;
    if target.role > requester.role {
        return Err(ApiError::Forbidden("cannot delete a user above your own role".to_string()));
    }
    storage_meta::users::delete(&state.pool, id).await?;
    Ok(())
}
