use thiserror::Error;

/// Main error type for the service core
#[derive(Error, Debug)]
pub enum AurumError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Caller errors (4xx-equivalent)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Artifact corruption is always fatal
    #[error("Integrity failure: {0}")]
    Integrity(String),

    // External trainer/backtest engine raised
    #[error("Capability failure: {capability} - {reason}")]
    Capability { capability: String, reason: String },

    // Strict walk-forward mode aborts instead of degrading
    #[error("Walk-forward fold failure: {0}")]
    FoldFailure(String),

    #[error("Model version not found: {0}")]
    ModelNotFound(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AurumError {
    /// Shorthand for capability failures from a named external engine
    pub fn capability(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Capability {
            capability: capability.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for AurumError
pub type Result<T> = std::result::Result<T, AurumError>;
