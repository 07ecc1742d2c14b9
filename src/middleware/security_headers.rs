//! Security headers added to every response.
//!
//! The header set is computed once from configuration and shared by reference;
//! the middleware only copies precomputed values into each response.

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::SecurityConfig;

/// Precomputed response headers.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    /// Baseline headers plus optional HSTS and CSP.
    ///
    /// - `X-Content-Type-Options: nosniff`
    /// - `X-Frame-Options: DENY`
    /// - `Referrer-Policy: strict-origin-when-cross-origin`
    /// - `Permissions-Policy: geolocation=(), microphone=(), camera=()`
    /// - `Cross-Origin-Opener-Policy` / `Cross-Origin-Resource-Policy: same-origin`
    pub fn from_config(security: Option<&SecurityConfig>) -> Self {
        let mut headers = vec![
            (HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff")),
            (HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY")),
            (
                HeaderName::from_static("referrer-policy"),
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                HeaderName::from_static("permissions-policy"),
                HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
            ),
            (HeaderName::from_static("cross-origin-opener-policy"), HeaderValue::from_static("same-origin")),
            (HeaderName::from_static("cross-origin-resource-policy"), HeaderValue::from_static("same-origin")),
        ];

        if let Some(sec) = security {
            if sec.enable_hsts.unwrap_or(false) {
                let max_age = sec.hsts_max_age.unwrap_or(31536000); // 1 year
                let include_sub =
                    if sec.hsts_include_subdomains.unwrap_or(false) { "; includeSubDomains" } else { "" };
                let value = format!("max-age={}{}", max_age, include_sub);
                headers.push((
                    HeaderName::from_static("strict-transport-security"),
                    HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("max-age=31536000")),
                ));
            }
            if let Some(csp) = sec.csp.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                match HeaderValue::from_str(csp) {
                    Ok(val) => headers.push((HeaderName::from_static("content-security-policy"), val)),
                    Err(e) => tracing::warn!("Ignoring invalid CSP value: {}", e),
                }
            }
        }

        Self { headers }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

pub async fn security_headers_middleware(
    State(security): State<Arc<SecurityHeaders>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    for (name, value) in &security.headers {
        headers.insert(name.clone(), value.clone());
    }

    // Admission decisions and tokens must never be served from a cache
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|s| s.starts_with("application/json"));
    if is_json {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_headers() {
        let base = SecurityHeaders::from_config(None);
        assert_eq!(base.len(), 6);

        let sec = SecurityConfig {
            enable_hsts: Some(true),
            hsts_max_age: Some(600),
            hsts_include_subdomains: Some(true),
            csp: Some("default-src 'self'".to_string()),
        };
        let full = SecurityHeaders::from_config(Some(&sec));
        assert_eq!(full.len(), 8);
        assert!(full
            .headers
            .iter()
            .any(|(n, v)| n == "strict-transport-security" && v == "max-age=600; includeSubDomains"));
    }
}
