//! Core error types.

use thiserror::Error;

/// Error type for configuration and file-system setup.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration was read but is not usable
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., home directory not found)
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
