use axum::{
    extract::{FromRequest, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::AppError,
    security::{looks_like_sql_injection, sanitize, suspicious_fields},
    state::AppState,
};

/// An Axum middleware that screens incoming requests before they reach a handler.
///
/// This middleware checks for:
/// - Path traversal attempts in the request URI.
/// - Suspicious user agents (logged only).
/// - Declared content length above `server.max_body_size`.
/// - Query parameters shaped like SQL injection (logged; rejected when
///   `screening.block_sql_injection` is set).
pub async fn validate_request_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let uri_path = req.uri().path();
    if contains_path_traversal(uri_path) {
        state.metrics.inc_rejected();
        return AppError::BadRequest("Path traversal detected in request".to_string()).into_response();
    }

    if let Some(user_agent) = req.headers().get("user-agent") {
        if let Ok(ua_str) = user_agent.to_str() {
            if is_suspicious_user_agent(ua_str) {
                tracing::warn!("Suspicious user agent detected: {}", sanitize_for_logging(ua_str));
            }
        }
    }

    // Early rejection; the body limit layer still enforces the real cap
    if matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        let declared = req
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok());
        let max_bytes = state.config.server.max_body_size;
        if declared.is_some_and(|len| len > max_bytes) {
            state.metrics.inc_rejected();
            return AppError::PayloadTooLarge { max_bytes }.into_response();
        }
    }

    if let Some(query) = req.uri().query() {
        if let Some(field) = suspicious_query_param(query) {
            state.metrics.inc_sql_injection_flags();
            tracing::warn!(path = %uri_path, "Suspected SQL injection in query parameter '{}'", sanitize_for_logging(&field));
            if state.config.screening.block_sql_injection {
                state.metrics.inc_rejected();
                return AppError::SqlInjectionSuspected { field }.into_response();
            }
        }
    }

    next.run(req).await
}

/// Name of the first decoded query parameter whose value looks like SQL injection.
fn suspicious_query_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(_, value)| looks_like_sql_injection(value))
        .map(|(name, _)| name.into_owned())
}

/// Check if a path contains traversal attempts
fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    // Direct traversal patterns
    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }

    if path.contains("/./") || path.contains("\\.\\") {
        return true;
    }

    // Multiple dots (bypass attempt: ....)
    if path.contains("....") {
        return true;
    }

    // URL-encoded variants (single and double encoding)
    let encoded_patterns = [
        "%2e%2e",
        "%252e%252e", // .. and double-encoded ..
        "%2e/",
        "%252e%2f", // ./
        "/%2e",
        "%2f%2e", // /.
        "%2e\\",
        "%2e%5c", // .\\
        "%5c%2e",
        "%5c%5c", // \\.
        "%00",    // Null byte
    ];

    if encoded_patterns.iter().any(|p| lower.contains(p)) {
        return true;
    }

    path.contains('\0')
}

/// Check for suspicious user agents (simple heuristic)
fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua_lower = ua.to_lowercase();
    ua_lower.contains("scanner")
        || (ua_lower.contains("crawler") && !ua_lower.contains("googlebot") && !ua_lower.contains("bingbot"))
        || ua_lower.contains("nikto")
        || ua_lower.contains("sqlmap")
        || ua_lower.contains("havij")
        || ua_lower.contains("acunetix")
}

/// Sanitizes user input for logging purposes.
///
/// Removes control characters (except whitespace), caps the length at 200
/// characters and escapes quotes.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\\'")
}

/// JSON body extractor that sanitizes every string before deserializing into `T`.
///
/// Strings that look like SQL injection are logged, and reject the request when
/// `screening.block_sql_injection` is set.
#[derive(Debug, Clone)]
pub struct SanitizedJson<T>(pub T);

impl<T> FromRequest<AppState> for SanitizedJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        let flagged = suspicious_fields(&raw);
        if let Some(first) = flagged.first() {
            state.metrics.inc_sql_injection_flags();
            tracing::warn!("Suspected SQL injection in {} body field(s), first at {}", flagged.len(), first);
            if state.config.screening.block_sql_injection {
                state.metrics.inc_rejected();
                return Err(AppError::SqlInjectionSuspected { field: first.clone() });
            }
        }

        let value = serde_json::from_value(sanitize(raw))
            .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e)))?;
        Ok(SanitizedJson(value))
    }
}
