//! # Admission Guard
//!
//! Request-admission security layer for axum services: per-identifier rate
//! limiting, per-session CSRF tokens, HTML input sanitization and
//! SQL-injection screening.
//!
//! ## Architecture
//!
//! The crate is built using:
//! - **Axum**: middleware and the standalone admission service
//! - **Tokio**: async runtime and the periodic rate-limit sweep
//! - **DashMap**: sharded in-memory stores behind the [`store::Store`] trait
//! - **Serde**: JSON bodies and configuration
//!
//! ## Core Components
//!
//! - [`config`]: Layered configuration (embedded defaults, file, environment)
//! - [`error`]: Error type and HTTP error responses
//! - [`metrics`]: Admission counters
//! - [`middleware`]: Rate limiting, CSRF, identity, screening and security headers
//! - [`routes`]: HTTP handlers and router assembly
//! - [`security`]: Pure sanitizer and SQL-injection heuristics
//! - [`state`]: Shared application state
//! - [`store`]: Keyed store abstraction and its in-memory implementation
//! - [`types`]: Request and response bodies
//!
//! ## Embedding
//!
//! ```no_run
//! use admission_guard::{config::AppConfig, routes::with_admission_layers, state::AppState};
//! use axum::{routing::get, Router};
//!
//! let state = AppState::new(AppConfig::default());
//! let app = with_admission_layers(Router::new().route("/api/products", get(|| async { "[]" })), state);
//! # let _ = app;
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
