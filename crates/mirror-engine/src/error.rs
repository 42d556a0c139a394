//! Engine error types.

use crate::CurrencyKey;
use ledger_client::LedgerError;
use thiserror::Error;

/// A raw message that could not be interpreted. Logged and dropped.
#[derive(Error, Debug)]
pub enum MalformedEventError {
    /// Payload is not JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Payload is JSON but not an object
    #[error("message is not a JSON object")]
    NotAnObject,

    /// A field required for a trust-line event is absent
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// The requested limit is not a usable amount
    #[error("invalid trust limit '{0}'")]
    InvalidLimit(String),
}

/// A mirrored trust line could not be established.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("trust line for {key} failed: {source}")]
    TrustLine {
        key: CurrencyKey,
        #[source]
        source: LedgerError,
    },
}

/// Failure reported by the storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage write failed: {0}")]
    Write(String),
}
