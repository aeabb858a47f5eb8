use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Service-level configuration
///
/// Loaded from an optional `aurum.toml` plus `AURUM_`-prefixed environment
/// variables; every field has a default so a bare environment works.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Deployment environment name ("development", "staging", ...)
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Log level passed to the tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Overall per-request deadline hint for callers
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Timeout for artifact fetch-by-URL (the only blocking I/O in the core)
    #[serde(default = "default_artifact_fetch_timeout_ms")]
    pub artifact_fetch_timeout_ms: u64,
    /// When true, a corroborating backtest failure aborts the evaluation
    #[serde(default = "default_true")]
    pub strict_backtest: bool,
    /// When true, a feature-schema fingerprint mismatch between the request
    /// and the dataset build is rejected instead of threaded through
    #[serde(default)]
    pub enforce_schema_fingerprint: bool,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_artifact_fetch_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            request_timeout_ms: default_request_timeout_ms(),
            artifact_fetch_timeout_ms: default_artifact_fetch_timeout_ms(),
            strict_backtest: true,
            enforce_schema_fingerprint: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `aurum.toml` (if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("aurum").required(false))
            .add_source(Environment::with_prefix("AURUM"))
            .build()?
            .try_deserialize()
    }
}
