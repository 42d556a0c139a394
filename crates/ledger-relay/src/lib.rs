//! Ledger subscription connection manager.
//!
//! This crate provides:
//! - A websocket connection to an XRPL node
//! - Subscription to the watched account (and the ledger stream) on every connect
//! - A lazy stream of raw inbound messages that ends instead of erroring
//! - Keepalive pings so a quiet account still produces traffic
//!
//! Reconnection policy lives with the caller; a [`Connection`] is single-use.

mod client;
mod error;
mod messages;

pub use client::{Connection, Connector, RawEvent, RelayClient, RelayConfig};
pub use error::{RelayError, RelayResult};
pub use messages::{LedgerRequest, LedgerResponse};
