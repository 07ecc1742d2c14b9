use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::middleware::LimitCategory;

#[derive(Debug, Clone, Deserialize)]
pub struct LimitCheckRequest {
    pub identifier: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitCheckResponse {
    pub allowed: bool,
    pub category: LimitCategory,
    pub limit: u32,
    pub remaining: u32,
    /// RFC 3339 wall-clock time at which the window resets.
    pub reset_at: String,
    /// Seconds until the window resets.
    pub retry_after: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfValidateRequest {
    pub session_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfValidateResponse {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    pub session_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenResponse {
    pub sanitized: Value,
    pub sql_injection_suspected: bool,
    pub suspicious_fields: Vec<String>,
}
