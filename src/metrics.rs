use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Admission counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub requests_admitted: Arc<AtomicU64>,
    pub requests_rate_limited: Arc<AtomicU64>,
    pub csrf_tokens_issued: Arc<AtomicU64>,
    pub csrf_rejections: Arc<AtomicU64>,
    pub sql_injection_flags: Arc<AtomicU64>,
    pub requests_rejected: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_admitted: Arc::new(AtomicU64::new(0)),
            requests_rate_limited: Arc::new(AtomicU64::new(0)),
            csrf_tokens_issued: Arc::new(AtomicU64::new(0)),
            csrf_rejections: Arc::new(AtomicU64::new(0)),
            sql_injection_flags: Arc::new(AtomicU64::new(0)),
            requests_rejected: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_admitted(&self) {
        self.requests_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.requests_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_issued(&self) {
        self.csrf_tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_rejections(&self) {
        self.csrf_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sql_injection_flags(&self) {
        self.sql_injection_flags.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_admitted: self.requests_admitted.load(Ordering::Relaxed),
            requests_rate_limited: self.requests_rate_limited.load(Ordering::Relaxed),
            csrf_tokens_issued: self.csrf_tokens_issued.load(Ordering::Relaxed),
            csrf_rejections: self.csrf_rejections.load(Ordering::Relaxed),
            sql_injection_flags: self.sql_injection_flags.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            csrf_sessions: 0,
            rate_limit_keys: 0,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub requests_admitted: u64,
    pub requests_rate_limited: u64,
    pub csrf_tokens_issued: u64,
    pub csrf_rejections: u64,
    pub sql_injection_flags: u64,
    pub requests_rejected: u64,
    pub uptime_seconds: u64,
    /// Sessions currently holding a CSRF token.
    pub csrf_sessions: u64,
    /// Live keys across the rate-limit stores.
    pub rate_limit_keys: u64,
}
