//! `/invites/*` handlers (spec §6, §4.7).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use storage_meta::models::Role;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::InvitationDto;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateInviteBody {
    email: String,
    role: String,
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    Role::parse(raw).ok_or_else(|| ApiError::Validation(format!("unknown role \"{raw}\"")))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateInviteBody>,
) -> Result<Json<InvitationDto>, ApiError> {
    let role = parse_role(&body.role)?;
    let invitation = state.invitations.create(&user, &body.email, role).await?;
    Ok(Json(InvitationDto::from(&invitation)))
}

/// Owners see every invitation in the system; admins and users see only the
/// ones they personally sent.
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<InvitationDto>>, ApiError> {
    let invitations = if user.role == Role::Owner {
        state.invitations.list_all().await?
    } else {
        state.invitations.list_sent_by(&user).await?
    };
    Ok(Json(invitations.iter().map(InvitationDto::from).collect()))
}

pub async fn revoke(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<(), ApiError> {
    state.invitations.revoke(&user, id).await?;
    Ok(())
}

pub async fn validate(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<InvitationDto>, ApiError> {
    let invitation = state.invitations.validate(&token).await?;
    Ok(Json(InvitationDto::from(&invitation)))
}

#[derive(Deserialize)]
pub struct AcceptInviteBody {
    token: String,
    email: String,
}

/// Confirms a token is redeemable for the given email ahead of rendering the
/// registration form. Does not consume the invitation: consumption happens
/// atomically with user creation in `/auth/register`.
pub async fn accept(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AcceptInviteBody>,
) -> Result<Json<InvitationDto>, ApiError> {
    let invitation = state
        .invitations
        .validate_for_registration(&body.token, &body.email)
        .await?;
    Ok(Json(InvitationDto::from(&invitation)))
}
