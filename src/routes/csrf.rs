use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::csrf::session_id_from_headers,
    state::AppState,
    types::CsrfTokenResponse,
};

/// Issues a CSRF token for the caller's session.
///
/// Callers without a session get a new one, returned in the body and as a cookie.
pub async fn issue_token(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cfg = &state.config.csrf;
    let (session_id, created) = match session_id_from_headers(&headers, cfg) {
        Some(sid) => (sid, false),
        None => (uuid::Uuid::new_v4().to_string(), true),
    };

    let token = state.csrf.generate_token(&session_id).ok_or_else(|| {
        tracing::warn!(sessions = state.csrf.session_count(), "CSRF session store is full; refusing new session");
        AppError::Unavailable("Too many active sessions, please try again later".to_string())
    })?;
    state.metrics.inc_csrf_issued();
    tracing::debug!(new_session = created, "Issued CSRF token");

    let mut res = Json(CsrfTokenResponse { session_id: session_id.clone(), token }).into_response();
    if created {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", cfg.session_cookie, session_id);
        let value = HeaderValue::from_str(&cookie).map_err(|e| anyhow::anyhow!("invalid session cookie: {}", e))?;
        res.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(res)
}
