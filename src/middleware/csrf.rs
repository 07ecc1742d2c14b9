//! Cross-Site Request Forgery (CSRF) protection.
//!
//! Each session holds at most one token. Issuing a new token replaces the old
//! one, and validation is scoped to the session that requested it, so a token
//! leaked from one session is useless in another. Tokens do not expire on
//! their own; they live until reissued or until the process exits. The number
//! of sessions is capped, and new sessions are refused once the cap is reached.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

use super::rate_limit::path_has_prefix;
use crate::{
    config::CsrfConfig,
    error::AppError,
    security::constant_time_eq,
    state::AppState,
    store::{MemoryStore, Store},
};

const TOKEN_BYTES: usize = 32;

/// Issues and validates per-session anti-forgery tokens.
#[derive(Clone)]
pub struct CsrfGuard {
    store: Arc<dyn Store<String>>,
    max_sessions: usize,
}

impl Default for CsrfGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrfGuard {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store<String>>) -> Self {
        Self { store, max_sessions: usize::MAX }
    }

    /// Caps the number of sessions holding a token.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Generates a fresh random token for `session_id`, replacing any previous one.
    ///
    /// Returns `None` when `session_id` has no token yet and the store is at
    /// capacity. Reissuing for a known session always succeeds.
    pub fn generate_token(&self, session_id: &str) -> Option<String> {
        if self.store.len() >= self.max_sessions && self.store.get(session_id).is_none() {
            return None;
        }
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.store.set(session_id, token.clone());
        Some(token)
    }

    /// Sessions currently holding a token.
    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// True only if `candidate` equals the token currently issued to `session_id`.
    pub fn validate_token(&self, session_id: &str, candidate: &str) -> bool {
        if session_id.is_empty() || candidate.is_empty() {
            return false;
        }
        match self.store.get(session_id) {
            Some(expected) => constant_time_eq(expected.as_bytes(), candidate.as_bytes()),
            None => false,
        }
    }

    /// Drops the token for a session, e.g. on logout.
    pub fn revoke(&self, session_id: &str) -> bool {
        self.store.delete(session_id).is_some()
    }
}

/// Session id from the configured header, falling back to the session cookie.
pub fn session_id_from_headers(headers: &HeaderMap, cfg: &CsrfConfig) -> Option<String> {
    let from_header = headers
        .get(cfg.session_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if from_header.is_some() {
        return from_header;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cfg.session_cookie)
        .map(|(_, value)| value.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// CSRF protection middleware for state-changing operations.
///
/// POST, PUT, PATCH and DELETE requests outside the exempt prefixes must carry
/// the session id and the token issued for it; otherwise they are answered with
/// 403 and never reach the handler.
pub async fn csrf_protection_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let cfg = &state.config.csrf;
    if !cfg.enabled || !is_state_changing(req.method()) {
        return next.run(req).await;
    }
    let path = req.uri().path();
    if is_exempt_path(path, cfg) {
        return next.run(req).await;
    }

    let headers = req.headers();
    let session_id = session_id_from_headers(headers, cfg);
    let token = headers.get(cfg.token_header.as_str()).and_then(|v| v.to_str().ok());

    let valid = match (session_id.as_deref(), token) {
        (Some(sid), Some(tok)) => state.csrf.validate_token(sid, tok),
        _ => false,
    };

    if !valid {
        state.metrics.inc_csrf_rejections();
        tracing::warn!(method = %req.method(), %path, "CSRF validation failed");
        return AppError::CsrfValidationFailed(format!(
            "Missing or invalid CSRF token. Fetch one from /api/csrf-token and send it in '{}'",
            cfg.token_header
        ))
        .into_response();
    }

    next.run(req).await
}

fn is_exempt_path(path: &str, cfg: &CsrfConfig) -> bool {
    cfg.exempt_prefixes.iter().any(|p| path_has_prefix(path, p))
}

fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
}
