use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::AuthConfig, error::AppError, security::constant_time_eq, state::AppState};

/// The user id resolved from a bearer token, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Resolves `Authorization: Bearer <token>` against the configured token table.
///
/// A matching token attaches [`AuthenticatedUser`] so later layers rate limit by
/// user instead of by address. Unknown or missing tokens are not rejected here;
/// the request simply continues as anonymous.
pub async fn identity_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    if let Some(token) = provided {
        match resolve_user(&state.config.auth.tokens, &token) {
            Some(user_id) => {
                req.extensions_mut().insert(AuthenticatedUser(user_id));
            }
            None => tracing::debug!("Unrecognised bearer token; treating request as anonymous"),
        }
    }

    next.run(req).await
}

/// Guards the internal admission API.
///
/// Runs after [`identity_middleware`]. Anonymous callers get 401; authenticated
/// users missing from `auth.internal_users` get 403.
pub async fn require_internal_caller(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let caller = req.extensions().get::<AuthenticatedUser>().map(|u| u.0.clone());
    if let Err(e) = authorize_internal(&state.config.auth, caller.as_deref()) {
        state.metrics.inc_rejected();
        tracing::warn!(path = %req.uri().path(), caller = ?caller, "Internal API call refused");
        return e.into_response();
    }
    next.run(req).await
}

fn authorize_internal(auth: &AuthConfig, caller: Option<&str>) -> Result<(), AppError> {
    match caller {
        None => Err(AppError::Unauthorized("A service bearer token is required".to_string())),
        Some(id) if auth.internal_users.iter().any(|u| u == id) => Ok(()),
        Some(_) => Err(AppError::Forbidden("Caller is not allowed to use the internal API".to_string())),
    }
}

/// Finds the user for `token`, comparing against every configured token in constant time.
pub fn resolve_user<'a, I>(tokens: I, token: &str) -> Option<String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    if token.is_empty() {
        return None;
    }
    let mut found = None;
    for (candidate, user_id) in tokens {
        if constant_time_eq(candidate.as_bytes(), token.as_bytes()) && found.is_none() {
            found = Some(user_id.clone());
        }
    }
    found
}
