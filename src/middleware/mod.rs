//! Middleware components for HTTP request admission.
//!
//! Layered onto a router in this order (outermost first): security headers,
//! identity resolution, rate limiting, CSRF protection, request screening.

pub mod auth;
pub mod csrf;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use csrf::CsrfGuard;
pub use rate_limit::{LimitCategory, RateLimitDecision, RateLimiter, RateLimiters};
pub use validation::SanitizedJson;
