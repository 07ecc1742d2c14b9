use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::{CsrfGuard, RateLimiters};

/// The shared application state.
///
/// Cheap to clone; every field is reference counted. Stores are created here
/// at startup and live for the life of the process.
#[derive(Clone)]
pub struct AppState {
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// One fixed-window limiter per category, each with its own store.
    pub rate_limiters: RateLimiters,
    /// Per-session anti-forgery tokens.
    pub csrf: CsrfGuard,
    pub metrics: Metrics,
}

impl AppState {
    /// Creates state with in-memory stores built from `config`.
    pub fn new(config: AppConfig) -> Self {
        let rate_limiters = RateLimiters::from_settings(&config.rate_limit);
        let csrf = CsrfGuard::new().with_max_sessions(config.csrf.max_sessions);
        Self {
            config: Arc::new(config),
            rate_limiters,
            csrf,
            metrics: Metrics::new(),
        }
    }
}
