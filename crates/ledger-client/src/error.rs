//! Ledger submission error types.

use thiserror::Error;

/// Why a submission did not produce a validated, successful transaction.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Node unreachable or connection lost mid-request
    #[error("Connection error: {0}")]
    Connection(String),

    /// Submission exceeded its time budget
    #[error("Submission timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The node or the ledger refused the transaction
    #[error("Transaction rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The node answered with something unexpected
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An amount could not be expressed on the ledger
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;
