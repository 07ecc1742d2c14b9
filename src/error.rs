use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const RATE_LIMIT_LIMIT: &str = "ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "ratelimit-reset";

/// The primary error type for the application.
///
/// None of these are fatal to the process; each one is turned into a 4xx/5xx
/// response at the request boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// A bounded store is full; retry later.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// The caller exhausted its quota; retry once the window resets.
    #[error("Rate limited. Retry after {retry_after_seconds} seconds")]
    RateLimited {
        message: String,
        limit: u32,
        retry_after_seconds: u64,
    },
    /// Missing or mismatched anti-forgery token; reissue and retry.
    #[error("CSRF validation failed: {0}")]
    CsrfValidationFailed(String),
    /// Advisory signal. Only raised when screening is configured to block.
    #[error("Suspected SQL injection in {field}")]
    SqlInjectionSuspected { field: String },
    #[error("Request body exceeds maximum size of {max_bytes} bytes")]
    PayloadTooLarge { max_bytes: usize },
    /// For when a specific field in a request fails validation.
    #[error("Validation error on field '{field}': {message}")]
    ValidationError { field: String, message: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Error ID: {}", error_id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg, None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None),
            AppError::RateLimited { message, limit, retry_after_seconds } => {
                return rate_limited_response(&message, limit, 0, retry_after_seconds);
            }
            AppError::CsrfValidationFailed(msg) => {
                (StatusCode::FORBIDDEN, "CSRF_VALIDATION_FAILED", msg, None)
            }
            AppError::SqlInjectionSuspected { field } => (
                StatusCode::BAD_REQUEST,
                "SQL_INJECTION_SUSPECTED",
                "Request contains disallowed input".to_string(),
                Some(json!({ "field": field })),
            ),
            AppError::PayloadTooLarge { max_bytes } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds maximum size of {} bytes", max_bytes),
                None,
            ),
            AppError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

/// Builds the 429 response: `RateLimit-*` and `Retry-After` headers plus
/// `{ error, message, retryAfter }`.
pub fn rate_limited_response(message: &str, limit: u32, remaining: u32, retry_after_seconds: u64) -> Response {
    let body = json!({
        "error": "Too many requests",
        "message": message,
        "retryAfter": retry_after_seconds,
    });
    let mut res = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    insert_rate_limit_headers(res.headers_mut(), limit, remaining, retry_after_seconds);
    res.headers_mut().insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
    res
}

pub fn insert_rate_limit_headers(
    headers: &mut axum::http::HeaderMap,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
) {
    headers.insert(HeaderName::from_static(RATE_LIMIT_LIMIT), HeaderValue::from(limit));
    headers.insert(HeaderName::from_static(RATE_LIMIT_REMAINING), HeaderValue::from(remaining));
    headers.insert(HeaderName::from_static(RATE_LIMIT_RESET), HeaderValue::from(reset_seconds));
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
