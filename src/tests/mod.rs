//! Router-level and cross-module tests.
//!
//! ## Test Modules
//!
//! - **api_tests**: Admission stack behaviour through the full router
//! - **config_tests**: Configuration loading and validation
//! - **error_tests**: Error responses
//! - **health_api_tests**: Health, version and metrics endpoints
//!
//! Individual modules can be run with e.g. `cargo test api_tests`.

pub mod error_tests;
pub mod health_api_tests;

use axum::{body::Body, http::Response};
use serde_json::Value;

pub(crate) async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub(crate) async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
