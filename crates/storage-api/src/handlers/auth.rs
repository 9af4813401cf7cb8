//! `/auth/*` handlers (spec §6).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthUser};
use crate::error::ApiError;
use crate::handlers::UserDto;
use crate::middleware::{extract_ip, rate_limit_key};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SetupStatus {
    #[serde(rename = "needsSetup")]
    needs_setup: bool,
}

pub async fn setup_status(State(state): State<Arc<AppState>>) -> Result<Json<SetupStatus>, ApiError> {
    let needs_setup = state.auth.needs_setup().await?;
    Ok(Json(SetupStatus { needs_setup }))
}

#[derive(Deserialize)]
pub struct RegisterBody {
    name: String,
    email: String,
    password: String,
    #[serde(rename = "inviteToken")]
    invite_token: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    password: String,
}

/// Shared by register and login: issue a session cookie for `user` and
/// respond with the wire user.
fn session_response(state: &AppState, jar: CookieJar, user: &storage_meta::models::User) -> Result<(CookieJar, Json<UserDto>), ApiError> {
    let token = auth::issue_token(user, &state.config.jwt_secret)?;
    let secure = !state.config.debug;
    let cookie = auth::session_cookie(token, state.config.cookie_domain.as_deref(), secure);
    Ok((jar.add(cookie), Json(UserDto::from(user))))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<RegisterBody>,
) -> Result<(CookieJar, Json<UserDto>), ApiError> {
    let user = state
        .auth
        .register(&body.name, &body.email, &body.password, body.invite_token.as_deref())
        .await?;
    session_response(&state, jar, &user)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<(CookieJar, Json<UserDto>), ApiError> {
    let ip = extract_ip(Some(addr), &headers, state.config.trust_proxy);
    rate_limit_key(&state.rate_limiters.login, &ip.to_string()).await?;
    let decision = state.limiter.check(ip, &body.email);
    if let storage_core::LimiterDecision::Blocked { retry_after_secs } = decision {
        return Err(ApiError::RateLimited { retry_after_secs });
    }
    match state.auth.login(&body.email, &body.password).await {
        Ok(user) => {
            state.limiter.record_success(ip, &body.email);
            session_response(&state, jar, &user)
        }
        Err(e) => {
            state.limiter.record_failure(ip, &body.email);
            Err(e.into())
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> CookieJar {
    let secure = !state.config.debug;
    let cookie = auth::clear_cookie(state.config.cookie_domain.as_deref(), secure);
    jar.add(cookie)
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserDto> {
    Json(UserDto::from(user))
}

#[derive(Deserialize)]
pub struct UpdateProfileBody {
    name: String,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Json<UserDto>, ApiError> {
    let updated = state.auth.update_profile(user.id, &body.name).await?;
    Ok(Json(UserDto::from(updated)))
}

#[derive(Deserialize)]
pub struct ChangePasswordBody {
    #[serde(rename = "currentPassword")]
    current_password: String,
    #[serde(rename = "newPassword")]
    new_password: String,
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    Json(body): Json<ChangePasswordBody>,
) -> Result<(), ApiError> {
    let ip = extract_ip(Some(addr), &headers, state.config.trust_proxy);
    rate_limit_key(&state.rate_limiters.change_password, &ip.to_string()).await?;
    state
        .auth
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    Ok(())
}

#[derive(Deserialize)]
pub struct ForgotPasswordBody {
    email: String,
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<ForgotPasswordBody>,
) -> Result<(), ApiError> {
    let ip = extract_ip(Some(addr), &headers, state.config.trust_proxy);
    rate_limit_key(&state.rate_limiters.forgot_password, &ip.to_string()).await?;

    if let Some((user, token)) = state.auth.forgot_password(&body.email).await? {
        if let Some(smtp) = state.config.smtp_settings() {
            let link = format!("{}/reset-password?token={}", state.config.frontend_url, token);
            let body = format!("Hello {},\n\nReset your password: {}\n\nThis link expires in one hour.", user.name, link);
            if let Err(e) = state.mail.send(&smtp, &user.email, "Reset your password", &body).await {
                tracing::warn!(error = %e, "failed to send password reset email");
            }
        }
    }
    // Always return the same opaque success regardless of whether the
    // address exists, so the endpoint can't be used to enumerate users.
    Ok(())
}

#[derive(Deserialize)]
pub struct ResetPasswordBody {
    token: String,
    password: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<ResetPasswordBody>,
) -> Result<(), ApiError> {
    let ip = extract_ip(Some(addr), &headers, state.config.trust_proxy);
    rate_limit_key(&state.rate_limiters.reset_password, &ip.to_string()).await?;
    state.auth.reset_password(&body.token, &body.password).await?;
    Ok(())
}
