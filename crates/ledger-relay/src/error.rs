//! Connection manager error types.

use thiserror::Error;

/// Errors raised while establishing a ledger subscription.
#[derive(Error, Debug)]
pub enum RelayError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The node rejected the subscribe request
    #[error("Subscription rejected: {0}")]
    Subscribe(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(&'static str),
}

/// Result type alias using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;
