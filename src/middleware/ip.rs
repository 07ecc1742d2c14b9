use axum::http::HeaderMap;
use std::net::IpAddr;

use super::auth::AuthenticatedUser;

/// Extract client IP from proxy headers and optional transport metadata.
///
/// Proxy headers are only consulted when `trust_proxy_headers` is set; without a
/// trusted proxy in front they are caller-controlled.
pub fn extract_ip_from_headers(headers: &HeaderMap, fallback: Option<IpAddr>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
            if let Some(first) = h.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
        if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
            if let Ok(ip) = h.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    if let Some(ip) = fallback {
        return ip;
    }
    IpAddr::from([127, 0, 0, 1])
}

/// Rate-limit scope for a request: `user:<id>` when authenticated, else `ip:<addr>`.
pub fn client_identifier(
    user: Option<&AuthenticatedUser>,
    headers: &HeaderMap,
    remote_ip: Option<IpAddr>,
    trust_proxy_headers: bool,
) -> String {
    match user {
        Some(AuthenticatedUser(id)) if !id.is_empty() => format!("user:{}", id),
        _ => format!("ip:{}", extract_ip_from_headers(headers, remote_ip, trust_proxy_headers)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_first_value() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let ip = extract_ip_from_headers(&headers, Some(IpAddr::from([10, 0, 0, 2])), true);
        assert_eq!(ip, IpAddr::from([203, 0, 113, 9]));
    }

    #[test]
    fn test_untrusted_headers_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.10"));
        let ip = extract_ip_from_headers(&headers, Some(IpAddr::from([10, 0, 0, 2])), false);
        assert_eq!(ip, IpAddr::from([10, 0, 0, 2]));
    }

    #[test]
    fn test_real_ip_and_loopback_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(extract_ip_from_headers(&headers, None, true), IpAddr::from([198, 51, 100, 4]));
        assert_eq!(extract_ip_from_headers(&HeaderMap::new(), None, true), IpAddr::from([127, 0, 0, 1]));
    }

    #[test]
    fn test_identifier_prefers_user() {
        let headers = HeaderMap::new();
        let user = AuthenticatedUser("42".to_string());
        assert_eq!(client_identifier(Some(&user), &headers, None, true), "user:42");
        assert_eq!(
            client_identifier(None, &headers, Some(IpAddr::from([192, 0, 2, 1])), true),
            "ip:192.0.2.1"
        );
    }
}
