//! HTTP route definitions (spec §6). Keeps the teacher's layering shape —
//! request id, access log, rate limit, session, CORS, trace, compression,
//! body-size cap, in that order — but the route table underneath is the
//! vault's own `/api/v1/*` surface instead of the teacher's S3 paths.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::middleware as axum_middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, auth, files, invites, public, settings, shares, storage};
use crate::middleware;
use crate::state::AppState;

/// Largest body axum will buffer before returning 413. One upload field plus
/// multipart framing overhead, rounded up from `FileService::MAX_UPLOAD_BYTES`.
const MAX_BODY_BYTES: usize = 1024 * 1024 * 1024 + 16 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors(&state);

    let auth_routes = Router::new()
        .route("/setup-status", get(auth::setup_status))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/profile", patch(auth::update_profile))
        .route("/change-password", post(auth::change_password))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let file_routes = Router::new()
        .route("/", get(files::list))
        .route("/", post(files::create))
        .route("/trash", get(files::list_trash))
        .route("/trash/empty", delete(files::empty_trash))
        .route("/check-duplicate", post(files::check_duplicate))
        .route("/bulk", delete(files::bulk_delete))
        .route("/shared", get(shares::list_shared_with_me))
        .route("/public-shares", get(shares::list_public_shares))
        .route("/private-shares", get(shares::list_private_shares))
        .route("/shares/{id}", delete(shares::revoke))
        .route(
            "/shares/{id}/public-settings",
            patch(shares::update_public_settings),
        )
        .route("/shares/{id}/download", get(shares::download_private))
        .route("/{id}", patch(files::rename).delete(files::soft_delete))
        .route("/{id}/upload", put(files::upload))
        .route("/{id}/download", get(files::download))
        .route("/{id}/restore", post(files::restore))
        .route("/{id}/permanent", delete(files::permanent_delete))
        .route("/{id}/share", post(shares::create_share));

    let public_routes = Router::new()
        .route("/share/{token}", get(public::public_metadata))
        .route("/share/{token}/download", get(public::public_download));

    let invite_routes = Router::new()
        .route("/", get(invites::list).post(invites::create))
        .route("/{id}/revoke", post(invites::revoke))
        .route("/validate/{token}", get(invites::validate))
        .route("/accept", post(invites::accept));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", put(admin::update_user).delete(admin::delete_user));

    let storage_routes = Router::new()
        .route("/overview", get(storage::overview))
        .route("/users", get(storage::list_users))
        .route("/users/{id}", get(storage::user_detail))
        .route("/users/{id}/quota", patch(storage::update_quota));

    let settings_routes = Router::new()
        .route("/", get(settings::get_settings).put(settings::put_settings))
        .route("/smtp", get(settings::get_smtp).put(settings::put_smtp))
        .route("/smtp/test", post(settings::test_smtp));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/files", file_routes)
        .nest("/public", public_routes)
        .nest("/invites", invite_routes)
        .nest("/admin", admin_routes)
        .nest("/storage", storage_routes)
        .nest("/settings", settings_routes)
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::general_rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::csrf_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// An empty `CORS_ORIGIN` leaves the browser's same-origin policy as the
/// only guard (fine for a same-host deployment behind one reverse proxy);
/// a configured allow-list is echoed back exactly, never wildcarded, since
/// credentialed (`jid` cookie) requests can't use `Access-Control-Allow-Origin: *`
/// together with wildcard methods/headers.
fn build_cors(state: &AppState) -> CorsLayer {
    let origins = state.config.cors_origins();
    let (allow_origin, allow_credentials) = if origins.is_empty() {
        (AllowOrigin::any(), false)
    } else {
        (
            AllowOrigin::list(origins.into_iter().filter_map(|o| o.parse().ok())),
            true,
        )
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(allow_credentials)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static("x-share-password"),
            header::HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([header::HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(3600))
}
