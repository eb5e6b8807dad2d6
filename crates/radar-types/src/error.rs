//! Error hierarchy for radar.

use thiserror::Error;

/// Top-level error type for radar operations.
#[derive(Debug, Error)]
pub enum RadarError {
    #[error("Model API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool session error: {0}")]
    Session(String),

    #[error("Turn limit exceeded: no final answer after {max_rounds} rounds")]
    TurnLimit { max_rounds: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors from the chat-completions API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Empty response: no content and no tool calls")]
    EmptyResponse,

    #[error("Request timeout")]
    Timeout,
}

impl ApiError {
    /// Whether the failure is transient and the request may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. }
                | ApiError::Server { .. }
                | ApiError::Network(_)
                | ApiError::Timeout
        )
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
