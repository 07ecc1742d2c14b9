//! Internal JSON API exposing the admission primitives to other services.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::time::Instant;

use crate::{
    error::{insert_rate_limit_headers, rate_limited_response, AppError, AppResult},
    middleware::LimitCategory,
    security::{sanitize, suspicious_fields},
    state::AppState,
    types::{CsrfValidateRequest, CsrfValidateResponse, LimitCheckRequest, LimitCheckResponse, ScreenResponse},
};

/// Runs one admission check for `identifier` under `category` (default `general`).
pub async fn check_limit(State(state): State<AppState>, Json(req): Json<LimitCheckRequest>) -> AppResult<Response> {
    if req.identifier.trim().is_empty() {
        return Err(AppError::ValidationError {
            field: "identifier".to_string(),
            message: "Identifier must not be empty".to_string(),
        });
    }
    let category = match req.category.as_deref() {
        None => LimitCategory::General,
        Some(raw) => raw
            .parse::<LimitCategory>()
            .map_err(|message| AppError::ValidationError { field: "category".to_string(), message })?,
    };

    let limiter = state.rate_limiters.limiter(category);
    let now = Instant::now();
    let decision = limiter.check_limit_at(&req.identifier, now);
    let retry_after = decision.retry_after(now);

    if !decision.allowed {
        state.metrics.inc_rate_limited();
        tracing::info!(identifier = %req.identifier, %category, "Admission denied");
        return Ok(rate_limited_response(&limiter.policy().message, decision.limit, 0, retry_after));
    }
    state.metrics.inc_admitted();

    let body = LimitCheckResponse {
        allowed: true,
        category,
        limit: decision.limit,
        remaining: decision.remaining,
        reset_at: decision.reset_at_utc(now).to_rfc3339(),
        retry_after,
    };
    let mut res = Json(body).into_response();
    insert_rate_limit_headers(res.headers_mut(), decision.limit, decision.remaining, retry_after);
    Ok(res)
}

pub async fn validate_csrf(
    State(state): State<AppState>,
    Json(req): Json<CsrfValidateRequest>,
) -> Json<CsrfValidateResponse> {
    let valid = state.csrf.validate_token(&req.session_id, &req.token);
    if !valid {
        state.metrics.inc_csrf_rejections();
    }
    Json(CsrfValidateResponse { valid })
}

/// Sanitizes an arbitrary JSON document and reports fields that look like SQL injection.
pub async fn screen(State(state): State<AppState>, Json(raw): Json<Value>) -> impl IntoResponse {
    let fields = suspicious_fields(&raw);
    if !fields.is_empty() {
        state.metrics.inc_sql_injection_flags();
    }
    Json(ScreenResponse {
        sanitized: sanitize(raw),
        sql_injection_suspected: !fields.is_empty(),
        suspicious_fields: fields,
    })
}
