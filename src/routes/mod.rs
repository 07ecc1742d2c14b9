//! HTTP routes and router assembly.
//!
//! - `health`: liveness, version and metrics endpoints
//! - `csrf`: browser-facing CSRF token issuance
//! - `admission`: internal JSON API over the limiter, CSRF guard and screening

pub mod admission;
pub mod csrf;
pub mod health;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    middleware::{
        auth, csrf as csrf_mw, rate_limit,
        security_headers::{self, SecurityHeaders},
        validation,
    },
    state::AppState,
};

/// The service's own routes, wrapped in the admission layers.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/api/health", get(health::health))
        .route("/version", get(health::version))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/api/csrf-token", get(csrf::issue_token))
        .merge(internal_routes(state.clone()))
        .with_state(state.clone());

    with_admission_layers(routes, state)
}

/// The internal admission API, open only to identities in `auth.internal_users`.
fn internal_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/internal/limits/check", post(admission::check_limit))
        .route("/api/internal/csrf/validate", post(admission::validate_csrf))
        .route("/api/internal/screen", post(admission::screen))
        .route_layer(from_fn_with_state(state, auth::require_internal_caller))
}

/// Wraps any router in the admission stack.
///
/// Requests pass, outermost first: security headers, request tracing, identity
/// resolution, rate limiting, CSRF protection, request screening, body limit.
pub fn with_admission_layers(router: Router, state: AppState) -> Router {
    let security = Arc::new(SecurityHeaders::from_config(state.config.security.as_ref()));
    let max_body = state.config.server.max_body_size;

    router
        .layer(DefaultBodyLimit::max(max_body))
        .layer(from_fn_with_state(state.clone(), validation::validate_request_middleware))
        .layer(from_fn_with_state(state.clone(), csrf_mw::csrf_protection_middleware))
        .layer(from_fn_with_state(state.clone(), rate_limit::rate_limit_middleware))
        .layer(from_fn_with_state(state, auth::identity_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(security, security_headers::security_headers_middleware))
}
