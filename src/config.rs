use std::collections::HashMap;

use serde::Deserialize;

use crate::middleware::rate_limit::LimitCategory;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,
}

/// One named limiter: `max_requests` admissions per `window_ms`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window_ms: u64,
    pub max_requests: u32,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRule {
    pub prefix: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub cleanup_interval_secs: u64,
    pub trust_proxy_headers: bool,
    #[serde(default)]
    pub exempt_paths: Vec<String>,
    #[serde(default)]
    pub exempt_prefixes: Vec<String>,
    pub auth: RateLimitPolicy,
    pub financial: RateLimitPolicy,
    pub general: RateLimitPolicy,
    pub enrollment: RateLimitPolicy,
    #[serde(default)]
    pub routes: Vec<RouteRule>,
}

impl RateLimitSettings {
    pub fn policy(&self, category: LimitCategory) -> &RateLimitPolicy {
        match category {
            LimitCategory::Auth => &self.auth,
            LimitCategory::Financial => &self.financial,
            LimitCategory::General => &self.general,
            LimitCategory::Enrollment => &self.enrollment,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    pub enabled: bool,
    pub session_header: String,
    pub session_cookie: String,
    pub token_header: String,
    #[serde(default)]
    pub exempt_prefixes: Vec<String>,
    /// Upper bound on sessions holding a token; new sessions are refused beyond it.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    100_000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScreeningConfig {
    #[serde(default)]
    pub block_sql_injection: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Bearer token -> user id.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    /// User ids allowed to call `/api/internal/*`. Empty closes the internal API.
    #[serde(default)]
    pub internal_users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitSettings,
    pub csrf: CsrfConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub security: Option<SecurityConfig>,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: admission-guard.toml (in CWD)
        .add_source(::config::File::with_name("admission-guard").required(false));

    if let Ok(custom_path) = std::env::var("ADMISSION_GUARD_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("ADMISSION_GUARD").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub(crate) fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.max_body_size == 0 {
        return Err(anyhow::anyhow!("server.max_body_size must be > 0"));
    }

    // Rate limiting
    let rl = &cfg.rate_limit;
    if rl.cleanup_interval_secs == 0 || rl.cleanup_interval_secs > 3600 {
        return Err(anyhow::anyhow!("rate_limit.cleanup_interval_secs must be in 1..=3600"));
    }
    for category in LimitCategory::ALL {
        let policy = rl.policy(category);
        if policy.window_ms == 0 {
            return Err(anyhow::anyhow!("rate_limit.{}.window_ms must be > 0", category));
        }
        if policy.max_requests == 0 {
            return Err(anyhow::anyhow!("rate_limit.{}.max_requests must be > 0", category));
        }
    }
    for rule in &rl.routes {
        if !rule.prefix.starts_with('/') {
            return Err(anyhow::anyhow!("rate_limit.routes prefix must start with '/': {}", rule.prefix));
        }
        if rule.category.parse::<LimitCategory>().is_err() {
            return Err(anyhow::anyhow!("rate_limit.routes has unknown category: {}", rule.category));
        }
    }

    // CSRF
    if cfg.csrf.enabled && (cfg.csrf.token_header.trim().is_empty() || cfg.csrf.session_header.trim().is_empty()) {
        return Err(anyhow::anyhow!("csrf.token_header and csrf.session_header must be set"));
    }
    if cfg.csrf.max_sessions == 0 {
        return Err(anyhow::anyhow!("csrf.max_sessions must be > 0"));
    }

    Ok(())
}
