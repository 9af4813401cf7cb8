//! `/settings/*` handlers: the admin-tunable settings bag and SMTP
//! configuration (spec §6). Role-gated to admins and owners.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::Value;
use storage_mail::SmtpSettings;
use storage_meta::models::Role;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const GENERAL_SETTINGS_KEY: &str = "general";
const SMTP_SETTINGS_KEY: &str = "smtp";

fn require_admin(role: Role) -> Result<(), ApiError> {
    if role >= Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin role required".to_string()))
    }
}

pub async fn get_settings(State(state): State<Arc<AppState>>, AuthUser(user): AuthUser) -> Result<Json<Value>, ApiError> {
    require_admin(user.role)?;
    let value = storage_meta::settings::get::<Value>(&state.pool, GENERAL_SETTINGS_KEY).await?;
    Ok(Json(value.unwrap_or_else(|| serde_json::json!({}))))
}

pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    require_admin(user.role)?;
    storage_meta::settings::set(&state.pool, GENERAL_SETTINGS_KEY, &body).await?;
    Ok(Json(body))
}

/// SMTP settings are read back with the password redacted, to avoid
/// round-tripping a stored secret into a response body.
pub async fn get_smtp(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Option<SmtpSettings>>, ApiError> {
    require_admin(user.role)?;
    let mut settings = storage_meta::settings::get::<SmtpSettings>(&state.pool, SMTP_SETTINGS_KEY).await?;
    if let Some(s) = settings.as_mut() {
        s.password.clear();
    }
    Ok(Json(settings))
}

pub async fn put_smtp(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<SmtpSettings>,
) -> Result<Json<SmtpSettings>, ApiError> {
    require_admin(user.role)?;
    storage_meta::settings::set(&state.pool, SMTP_SETTINGS_KEY, &body).await?;
    let mut echoed = body;
    echoed.password.clear();
    Ok(Json(echoed))
}

pub async fn test_smtp(State(state): State<Arc<AppState>>, AuthUser(user): AuthUser) -> Result<(), ApiError> {
    require_admin(user.role)?;
    let settings = storage_meta::settings::get::<SmtpSettings>(&state.pool, SMTP_SETTINGS_KEY)
        .await?
        .ok_or_else(|| ApiError::Validation("no SMTP settings configured".to_string()))?;
    state.mail.test_connection(&settings).await?;
    Ok(())
}
