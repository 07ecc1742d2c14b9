use crate::{metrics::MetricsSnapshot, state::AppState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, exempt from rate limiting
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Counters plus the current size of the CSRF and rate-limit stores.
fn snapshot(state: &AppState) -> MetricsSnapshot {
    let mut snapshot = state.metrics.get_snapshot();
    snapshot.csrf_sessions = state.csrf.session_count() as u64;
    snapshot.rate_limit_keys = state.rate_limiters.tracked_keys() as u64;
    snapshot
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(snapshot(&state))
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = snapshot(&state);
    let body = format!(
        "# HELP admission_requests_admitted Requests admitted by the rate limiter\n# TYPE admission_requests_admitted counter\nadmission_requests_admitted {}\n\
# HELP admission_requests_rate_limited Requests denied by the rate limiter\n# TYPE admission_requests_rate_limited counter\nadmission_requests_rate_limited {}\n\
# HELP admission_csrf_tokens_issued CSRF tokens issued\n# TYPE admission_csrf_tokens_issued counter\nadmission_csrf_tokens_issued {}\n\
# HELP admission_csrf_rejections Requests rejected for CSRF\n# TYPE admission_csrf_rejections counter\nadmission_csrf_rejections {}\n\
# HELP admission_sql_injection_flags Inputs flagged as suspected SQL injection\n# TYPE admission_sql_injection_flags counter\nadmission_sql_injection_flags {}\n\
# HELP admission_requests_rejected Requests rejected by screening\n# TYPE admission_requests_rejected counter\nadmission_requests_rejected {}\n\
# HELP admission_uptime_seconds Uptime seconds\n# TYPE admission_uptime_seconds gauge\nadmission_uptime_seconds {}\n\
# HELP admission_csrf_sessions Sessions holding a CSRF token\n# TYPE admission_csrf_sessions gauge\nadmission_csrf_sessions {}\n\
# HELP admission_rate_limit_keys Live rate-limit keys\n# TYPE admission_rate_limit_keys gauge\nadmission_rate_limit_keys {}\n",
        m.requests_admitted,
        m.requests_rate_limited,
        m.csrf_tokens_issued,
        m.csrf_rejections,
        m.sql_injection_flags,
        m.requests_rejected,
        m.uptime_seconds,
        m.csrf_sessions,
        m.rate_limit_keys,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
