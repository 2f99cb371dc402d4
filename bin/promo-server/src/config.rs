//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use promo_core::{OrchestratorConfig, RetryPolicy};

/// Default inference endpoint for the image model.
pub const DEFAULT_IMAGE_API_URL: &str =
    "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-dev";

/// Default request body limit (32 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Runtime configuration for promo-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; generation needs at least a Gemini API key to succeed.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:4000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins. `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Session lifetime in seconds, from creation.
    pub session_timeout_secs: u64,

    pub queue_capacity: usize,
    pub max_workers: usize,

    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Override for the Generative Language API base URL.
    pub gemini_base_url: Option<String>,

    pub image_api_url: String,
    /// Tried with the same retry policy once the primary endpoint gives up.
    pub image_backup_api_url: Option<String>,
    pub image_api_token: Option<String>,

    pub retry_attempts: u32,
    pub retry_initial_delay_ms: u64,

    /// Per-request timeout for upstream model calls.
    pub upstream_timeout_secs: u64,

    /// Largest accepted request body. Logos travel inline as base64, so this
    /// sits well above axum's 2 MiB default.
    pub max_body_bytes: usize,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            bind_address: env_or(&var, "PROMO_BIND", "0.0.0.0:4000"),
            log_level: env_or(&var, "PROMO_LOG", "info"),
            log_json: parse_bool(&var, "PROMO_LOG_JSON", false),
            cors_allowed_origins: var("PROMO_CORS_ORIGINS"),
            enable_docs: parse_bool(&var, "PROMO_ENABLE_DOCS", true),
            session_timeout_secs: parse_env(&var, "PROMO_SESSION_TIMEOUT_SECS", 3600),
            queue_capacity: parse_env(&var, "PROMO_QUEUE_CAPACITY", 256),
            max_workers: parse_env(&var, "PROMO_MAX_WORKERS", 16),
            gemini_api_key: var("PROMO_GEMINI_API_KEY").or_else(|| var("GEMINI_API_KEY")),
            gemini_model: env_or(&var, "PROMO_GEMINI_MODEL", promo_core::services::gemini::DEFAULT_MODEL),
            gemini_base_url: var("PROMO_GEMINI_BASE_URL"),
            image_api_url: env_or(&var, "PROMO_IMAGE_API_URL", DEFAULT_IMAGE_API_URL),
            image_backup_api_url: var("PROMO_IMAGE_BACKUP_API_URL"),
            image_api_token: var("PROMO_IMAGE_API_TOKEN").or_else(|| var("HF_TOKEN")),
            retry_attempts: parse_env(&var, "PROMO_RETRY_ATTEMPTS", 3),
            retry_initial_delay_ms: parse_env(&var, "PROMO_RETRY_INITIAL_DELAY_MS", 1000),
            upstream_timeout_secs: parse_env(&var, "PROMO_UPSTREAM_TIMEOUT_SECS", 120),
            max_body_bytes: parse_env(&var, "PROMO_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            queue_capacity: self.queue_capacity,
            max_workers: self.max_workers,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(var: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
