//! JWT session cookies and the CSRF origin check (spec §4.7). Business
//! rules (passwords, invitations, roles) live in `storage_core::auth`; this
//! module only turns a `storage_meta::models::User` into a signed cookie and
//! back, the same split `fula-cli/src/auth.rs` already drew between
//! "validate a token" and business logic elsewhere.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage_meta::models::{Role, User};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the session cookie (spec §6 "sets `jid`").
pub const SESSION_COOKIE: &str = "jid";

const SESSION_TTL_HOURS: i64 = 24 * 7;

/// JWT claims carried in the session cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    /// Role at the time the session was issued (re-checked against the
    /// database on privileged operations, not trusted blindly).
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// The authenticated identity attached to a request by
/// [`crate::middleware::session_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    pub fn require_role(&self, minimum: Role) -> Result<(), ApiError> {
        if self.role >= minimum {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "insufficient role for this operation".to_string(),
            ))
        }
    }
}

pub fn issue_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign session token: {e}")))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            ApiError::AuthRequired
        })
}

/// Build the `Set-Cookie` value for a freshly issued session.
pub fn session_cookie<'a>(token: String, domain: Option<&str>, secure: bool) -> Cookie<'a> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_secure(secure);
    cookie.set_path("/");
    cookie.set_max_age(Some(time::Duration::hours(SESSION_TTL_HOURS)));
    if let Some(domain) = domain {
        cookie.set_domain(domain.to_string());
    }
    cookie
}

/// Build the cookie that clears a session on logout.
pub fn clear_cookie<'a>(domain: Option<&str>, secure: bool) -> Cookie<'a> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_secure(secure);
    cookie.set_path("/");
    cookie.set_max_age(Some(time::Duration::seconds(0)));
    if let Some(domain) = domain {
        cookie.set_domain(domain.to_string());
    }
    cookie
}

/// CSRF guard for cookie-authenticated, state-changing requests: the
/// `Origin` (falling back to `Referer`) header must match one of the
/// configured allowed origins. A missing header on a mutating request is
/// itself rejected once an allow-list is configured — legitimate `fetch()`
/// calls always send one.
pub fn check_csrf(origin_or_referer: Option<&str>, allowed: &[String]) -> Result<(), ApiError> {
    if allowed.is_empty() {
        return Ok(());
    }
    let value = origin_or_referer
        .ok_or_else(|| ApiError::Forbidden("missing Origin header".to_string()))?;
    let matches = allowed.iter().any(|o| value == o);
    if matches {
        Ok(())
    } else {
        Err(ApiError::Forbidden("cross-origin request rejected".to_string()))
    }
}

/// Extracts the full, freshly-loaded [`User`] row for the request's session.
/// Resolves [`CurrentUser`] (attached by [`crate::middleware::session_middleware`])
/// into a database row so handlers always see current role/quota/usage,
/// never a stale snapshot from the signed cookie.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, ApiError> {
        let current = parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::AuthRequired)?;
        let user = storage_meta::users::find_by_id(&state.pool, current.id)
            .await
            .map_err(|e| match e {
                storage_meta::MetaError::NotFound => ApiError::AuthRequired,
                other => ApiError::Internal(other.to_string()),
            })?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "x".to_string(),
            role: Role::Owner,
            used_bytes: 0,
            quota_bytes: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_claims() {
        let user = sample_user();
        let token = issue_token(&user, "test-secret-at-least-32-bytes-long").unwrap();
        let claims = decode_token(&token, "test-secret-at-least-32-bytes-long").unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Owner);
    }

    #[test]
    fn rejects_wrong_secret() {
        let user = sample_user();
        let token = issue_token(&user, "test-secret-at-least-32-bytes-long").unwrap();
        assert!(decode_token(&token, "a-totally-different-secret-value").is_err());
    }

    #[test]
    fn csrf_allows_matching_origin() {
        let allowed = vec!["https://app.example.com".to_string()];
        assert!(check_csrf(Some("https://app.example.com"), &allowed).is_ok());
    }

    #[test]
    fn csrf_rejects_mismatched_origin() {
        let allowed = vec!["https://app.example.com".to_string()];
        assert!(check_csrf(Some("https://evil.example.com"), &allowed).is_err());
    }

    #[test]
    fn csrf_rejects_missing_origin_when_allowlist_set() {
        let allowed = vec!["https://app.example.com".to_string()];
        assert!(check_csrf(None, &allowed).is_err());
    }

    #[test]
    fn csrf_open_when_no_allowlist_configured() {
        assert!(check_csrf(None, &[]).is_ok());
    }
}
