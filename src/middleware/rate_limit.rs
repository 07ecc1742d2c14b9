use super::{auth::AuthenticatedUser, ip::client_identifier};
use crate::{
    config::{RateLimitPolicy, RateLimitSettings},
    error::{insert_rate_limit_headers, rate_limited_response},
    state::AppState,
    store::{MemoryStore, Store},
};
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    net::SocketAddr,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

/// Shared bucket for callers that failed to supply an identifier.
const UNIDENTIFIED_KEY: &str = "unidentified";

/// The independently scoped limiter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitCategory {
    Auth,
    Financial,
    General,
    Enrollment,
}

impl LimitCategory {
    pub const ALL: [LimitCategory; 4] =
        [LimitCategory::Auth, LimitCategory::Financial, LimitCategory::General, LimitCategory::Enrollment];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitCategory::Auth => "auth",
            LimitCategory::Financial => "financial",
            LimitCategory::General => "general",
            LimitCategory::Enrollment => "enrollment",
        }
    }
}

impl fmt::Display for LimitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auth" => Ok(LimitCategory::Auth),
            "financial" => Ok(LimitCategory::Financial),
            "general" => Ok(LimitCategory::General),
            "enrollment" => Ok(LimitCategory::Enrollment),
            other => Err(format!("unknown rate limit category: {}", other)),
        }
    }
}

/// Per-key window state. At most one lives in a store per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after(&self, now: Instant) -> u64 {
        let left = self.reset_at.saturating_duration_since(now);
        left.as_millis().div_ceil(1000) as u64
    }

    /// Wall-clock reset time, for JSON responses.
    pub fn reset_at_utc(&self, now: Instant) -> chrono::DateTime<chrono::Utc> {
        let left = self.reset_at.saturating_duration_since(now);
        chrono::Utc::now() + chrono::Duration::from_std(left).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// A fixed-window rate limiter over an injected store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn Store<RateLimitEntry>>,
    policy: RateLimitPolicy,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter backed by a fresh in-memory store.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_store(policy, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(policy: RateLimitPolicy, store: Arc<dyn Store<RateLimitEntry>>) -> Self {
        let window = Duration::from_millis(policy.window_ms);
        Self { store, policy, window }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Records one request for `identifier` and decides whether it is admitted.
    pub fn check_limit(&self, identifier: &str) -> RateLimitDecision {
        self.check_limit_at(identifier, Instant::now())
    }

    /// Same as [`check_limit`](Self::check_limit) with an explicit clock reading.
    ///
    /// A request arriving at or after `reset_at` opens a new window with `count = 1`.
    /// Inside the window the count is incremented and the request is denied once it
    /// exceeds `max_requests`.
    pub fn check_limit_at(&self, identifier: &str, now: Instant) -> RateLimitDecision {
        let key = if identifier.trim().is_empty() {
            tracing::error!("Rate limit check without identifier; counting under '{}'", UNIDENTIFIED_KEY);
            UNIDENTIFIED_KEY
        } else {
            identifier
        };

        let window = self.window;
        let entry = self.store.update(key, &mut |current| match current {
            Some(e) if now < e.reset_at => RateLimitEntry { count: e.count.saturating_add(1), reset_at: e.reset_at },
            _ => RateLimitEntry { count: 1, reset_at: now + window },
        });

        let limit = self.policy.max_requests;
        if entry.count > limit {
            RateLimitDecision { allowed: false, limit, remaining: 0, reset_at: entry.reset_at }
        } else {
            RateLimitDecision { allowed: true, limit, remaining: limit - entry.count, reset_at: entry.reset_at }
        }
    }

    /// Deletes every entry whose window has elapsed. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    pub fn cleanup_expired_at(&self, now: Instant) -> usize {
        self.store.retain(&mut |_, entry| entry.reset_at > now)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

/// The four category limiters plus the path rules that pick between them.
#[derive(Clone)]
pub struct RateLimiters {
    limiters: Arc<HashMap<LimitCategory, RateLimiter>>,
    /// Sorted longest prefix first.
    routes: Arc<Vec<(String, LimitCategory)>>,
    exempt_paths: Arc<Vec<String>>,
    exempt_prefixes: Arc<Vec<String>>,
    trust_proxy_headers: bool,
}

impl RateLimiters {
    /// Builds one limiter per category from configuration. Unknown route categories are skipped.
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        let limiters: HashMap<LimitCategory, RateLimiter> = LimitCategory::ALL
            .iter()
            .map(|c| (*c, RateLimiter::new(settings.policy(*c).clone())))
            .collect();

        let mut routes: Vec<(String, LimitCategory)> = settings
            .routes
            .iter()
            .filter_map(|r| match r.category.parse::<LimitCategory>() {
                Ok(c) => Some((r.prefix.clone(), c)),
                Err(e) => {
                    tracing::warn!("Ignoring rate limit route {}: {}", r.prefix, e);
                    None
                }
            })
            .collect();
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            limiters: Arc::new(limiters),
            routes: Arc::new(routes),
            exempt_paths: Arc::new(settings.exempt_paths.clone()),
            exempt_prefixes: Arc::new(settings.exempt_prefixes.clone()),
            trust_proxy_headers: settings.trust_proxy_headers,
        }
    }

    pub fn limiter(&self, category: LimitCategory) -> &RateLimiter {
        // from_settings fills every category
        &self.limiters[&category]
    }

    pub fn check(&self, category: LimitCategory, identifier: &str) -> RateLimitDecision {
        self.limiter(category).check_limit(identifier)
    }

    /// Health checks and static assets never reach a limiter.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path) || self.exempt_prefixes.iter().any(|p| path_has_prefix(path, p))
    }

    pub fn category_for(&self, path: &str) -> LimitCategory {
        self.routes
            .iter()
            .find(|(prefix, _)| path_has_prefix(path, prefix))
            .map(|(_, c)| *c)
            .unwrap_or(LimitCategory::General)
    }

    pub fn trust_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }

    /// Keys held across every category store.
    pub fn tracked_keys(&self) -> usize {
        self.limiters.values().map(|l| l.tracked_keys()).sum()
    }

    /// Sweeps expired entries from every category. Returns the number removed.
    pub fn cleanup_all(&self) -> usize {
        self.limiters.values().map(|l| l.cleanup_expired()).sum()
    }
}

/// Prefix match on a segment boundary: `/api/auth` covers `/api/auth` and
/// `/api/auth/login` but not `/api/authors`. A trailing `/` on the prefix is ignored.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Runs [`RateLimiters::cleanup_all`] on a fixed cadence for the life of the process.
pub fn spawn_cleanup_task(limiters: RateLimiters, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = limiters.cleanup_all();
            if removed > 0 {
                tracing::debug!("Rate limit sweep removed {} expired entries", removed);
            }
        }
    })
}

/// Axum middleware applying the category limiter matched by the request path.
///
/// The identifier is `user:<id>` when an upstream layer attached an
/// [`AuthenticatedUser`], otherwise `ip:<addr>`. Admitted responses carry the
/// `RateLimit-*` headers; denied requests get a 429 without reaching the handler.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let limiters = &state.rate_limiters;
    if limiters.is_exempt(&path) {
        return next.run(req).await;
    }

    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let identifier = client_identifier(
        req.extensions().get::<AuthenticatedUser>(),
        req.headers(),
        remote_ip,
        limiters.trust_proxy_headers(),
    );
    let category = limiters.category_for(&path);

    let now = Instant::now();
    let decision = limiters.limiter(category).check_limit_at(&identifier, now);
    let reset_secs = decision.retry_after(now);

    if !decision.allowed {
        state.metrics.inc_rate_limited();
        tracing::warn!(%identifier, %category, %path, "Rate limit exceeded; retry after {}s", reset_secs);
        let message = &limiters.limiter(category).policy().message;
        return rate_limited_response(message, decision.limit, 0, reset_secs);
    }

    state.metrics.inc_admitted();
    let mut res = next.run(req).await;
    insert_rate_limit_headers(res.headers_mut(), decision.limit, decision.remaining, reset_secs);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn policy(window_ms: u64, max_requests: u32) -> RateLimitPolicy {
        RateLimitPolicy { window_ms, max_requests, message: "slow down".to_string() }
    }

    #[test]
    fn test_quota_then_denial() {
        let limiter = RateLimiter::new(policy(60_000, 5));
        let now = Instant::now();

        let mut last_remaining = u32::MAX;
        for _ in 0..5 {
            let d = limiter.check_limit_at("user:1", now);
            assert!(d.allowed);
            assert!(d.remaining < last_remaining);
            last_remaining = d.remaining;
        }
        assert_eq!(last_remaining, 0);

        let denied = limiter.check_limit_at("user:1", now);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, now + Duration::from_millis(60_000));
    }

    #[test]
    fn test_window_reset_after_denial() {
        let limiter = RateLimiter::new(policy(1_000, 2));
        let start = Instant::now();
        for _ in 0..4 {
            limiter.check_limit_at("ip:10.0.0.1", start);
        }
        assert!(!limiter.check_limit_at("ip:10.0.0.1", start + Duration::from_millis(999)).allowed);

        let later = start + Duration::from_millis(1_000);
        let d = limiter.check_limit_at("ip:10.0.0.1", later);
        assert!(d.allowed);
        assert_eq!(d.remaining, 1);
        assert_eq!(d.reset_at, later + Duration::from_millis(1_000));
    }

    #[test]
    fn test_identifiers_do_not_share_quota() {
        let limiter = RateLimiter::new(policy(60_000, 1));
        let now = Instant::now();
        assert!(limiter.check_limit_at("ip:1.1.1.1", now).allowed);
        assert!(!limiter.check_limit_at("ip:1.1.1.1", now).allowed);

        let other = limiter.check_limit_at("ip:2.2.2.2", now);
        assert!(other.allowed);
        assert_eq!(other.remaining, 0);
    }

    #[test]
    fn test_empty_identifier_is_still_limited() {
        let limiter = RateLimiter::new(policy(60_000, 1));
        let now = Instant::now();
        assert!(limiter.check_limit_at("", now).allowed);
        assert!(!limiter.check_limit_at("  ", now).allowed);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Instant::now();
        let d = RateLimitDecision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_at: now + Duration::from_millis(1_500),
        };
        assert_eq!(d.retry_after(now), 2);
        assert_eq!(d.retry_after(now + Duration::from_secs(5)), 0);
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let limiter = RateLimiter::new(policy(1_000, 10));
        let start = Instant::now();
        limiter.check_limit_at("old", start);
        limiter.check_limit_at("fresh", start + Duration::from_millis(800));
        assert_eq!(limiter.tracked_keys(), 2);

        let removed = limiter.cleanup_expired_at(start + Duration::from_millis(1_200));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_categories_are_independent() {
        let limiters = RateLimiters::from_settings(&AppConfig::default().rate_limit);
        for _ in 0..5 {
            assert!(limiters.check(LimitCategory::Auth, "user:7").allowed);
        }
        assert!(!limiters.check(LimitCategory::Auth, "user:7").allowed);

        let financial = limiters.check(LimitCategory::Financial, "user:7");
        assert!(financial.allowed);
        assert_eq!(financial.remaining, 9);
    }

    #[test]
    fn test_route_matching_and_exemptions() {
        let limiters = RateLimiters::from_settings(&AppConfig::default().rate_limit);
        assert_eq!(limiters.category_for("/api/auth/login"), LimitCategory::Auth);
        assert_eq!(limiters.category_for("/api/payments/checkout"), LimitCategory::Financial);
        assert_eq!(limiters.category_for("/api/enroll"), LimitCategory::Enrollment);
        assert_eq!(limiters.category_for("/api/products"), LimitCategory::General);
        assert_eq!(limiters.category_for("/api/authors"), LimitCategory::General);
        assert_eq!(limiters.category_for("/api/authority/list"), LimitCategory::General);
        assert_eq!(limiters.category_for("/api/auth"), LimitCategory::Auth);
        assert_eq!(limiters.category_for("/api/enrollments"), LimitCategory::General);

        assert!(limiters.is_exempt("/health"));
        assert!(limiters.is_exempt("/api/health"));
        assert!(limiters.is_exempt("/_next/static/chunk.js"));
        assert!(!limiters.is_exempt("/healthz"));
        assert!(!limiters.is_exempt("/api/products"));
        assert!(!limiters.is_exempt("/static-report"));
        assert!(limiters.is_exempt("/favicon.ico"));
    }

    #[test]
    fn test_path_has_prefix() {
        assert!(path_has_prefix("/api/auth/login", "/api/auth"));
        assert!(path_has_prefix("/api/auth", "/api/auth/"));
        assert!(path_has_prefix("/static/app.css", "/static/"));
        assert!(path_has_prefix("/anything", "/"));
        assert!(!path_has_prefix("/api/authors", "/api/auth"));
        assert!(!path_has_prefix("/api", "/api/auth"));
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Auth".parse::<LimitCategory>(), Ok(LimitCategory::Auth));
        assert!("premium".parse::<LimitCategory>().is_err());
        assert_eq!(LimitCategory::Enrollment.to_string(), "enrollment");
    }

    #[tokio::test]
    async fn test_real_clock_window() {
        let limiter = RateLimiter::new(policy(200, 1));
        assert!(limiter.check_limit("ip:127.0.0.1").allowed);
        assert!(!limiter.check_limit("ip:127.0.0.1").allowed);

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(limiter.check_limit("ip:127.0.0.1").allowed);
    }
}
