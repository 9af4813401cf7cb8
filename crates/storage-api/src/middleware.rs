//! Request ID, logging, session resolution, and rate limiting. Generalized
//! from `fula-cli::middleware`'s single-limiter, single-auth-check shape
//! into the route-class limiters and JWT-cookie session spec §4.7/§5 need.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use axum::http::Method;

use crate::auth::{check_csrf, decode_token, CurrentUser, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::{AppState, KeyedLimiter};

/// Request ID extension, echoed/minted per request (generalized from the
/// teacher's `x-amz-request-id` middleware).
#[derive(Clone)]
pub struct RequestId(pub String);

pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let incoming = request
        .headers()
        .get("X-Request-ID")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let request_id = incoming.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}

pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "request completed"
    );

    response
}

/// Resolves the `jid` cookie into a [`CurrentUser`] and stores it in
/// request extensions. Does *not* reject anonymous requests — route
/// handlers that need auth extract `Option<Extension<CurrentUser>>` (or a
/// dedicated extractor) and return [`ApiError::AuthRequired`] themselves,
/// matching the teacher's split between "attach session" middleware and
/// per-handler authorization checks.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(claims) = decode_token(cookie.value(), &state.config.jwt_secret) {
            request.extensions_mut().insert(CurrentUser {
                id: claims.sub,
                role: claims.role,
            });
        }
    }
    next.run(request).await
}

fn client_ip(request: &Request<Body>) -> IpAddr {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    // Behind a reverse proxy, trust the first hop of X-Forwarded-For.
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Same resolution as [`client_ip`], usable from handlers that receive
/// `ConnectInfo`/`HeaderMap` extractors directly instead of the raw request.
pub fn extract_ip(addr: Option<SocketAddr>, headers: &HeaderMap, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = headers
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .and_then(|ip| ip.trim().parse().ok())
        {
            return ip;
        }
    }
    addr.map(|a| a.ip()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Apply a named rate limiter keyed by client IP. Used per route class
/// (login, register, upload, ...) per spec §5.
pub async fn rate_limit(
    limiter: &KeyedLimiter,
    request: &Request<Body>,
) -> Result<(), ApiError> {
    let key = client_ip(request).to_string();
    rate_limit_key(limiter, &key).await
}

/// Apply a named rate limiter against an already-resolved key (client IP as
/// a string, or some other per-route-class discriminator).
pub async fn rate_limit_key(limiter: &KeyedLimiter, key: &str) -> Result<(), ApiError> {
    limiter
        .check_key(&key.to_string())
        .map_err(|_| ApiError::RateLimited { retry_after_secs: 60 })
}

/// Rejects state-changing requests whose `Origin` (or `Referer`) header
/// isn't on the configured allow-list (spec §4.7). Only applies to
/// non-safe methods carrying the session cookie: GETs and bearer-token API
/// clients (which can't be driven cross-site via a browser form) are exempt.
pub async fn csrf_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let is_safe = matches!(request.method(), &Method::GET | &Method::HEAD | &Method::OPTIONS);
    if !is_safe && jar.get(SESSION_COOKIE).is_some() {
        let origin = request
            .headers()
            .get("Origin")
            .or_else(|| request.headers().get("Referer"))
            .and_then(|h| h.to_str().ok());
        check_csrf(origin, &state.config.cors_origins())?;
    }
    Ok(next.run(request).await)
}

pub async fn general_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    rate_limit(&state.rate_limiters.general, &request).await?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::{Quota, RateLimiter};
    use std::num::NonZeroU32;

    #[test]
    fn keyed_limiter_allows_then_blocks() {
        let limiter: KeyedLimiter = RateLimiter::keyed(Quota::per_minute(NonZeroU32::new(1).unwrap()));
        assert!(limiter.check_key(&"1.2.3.4".to_string()).is_ok());
        assert!(limiter.check_key(&"1.2.3.4".to_string()).is_err());
    }
}
