//! Control socket for a running mirror.
//!
//! Newline-delimited JSON over a Unix domain socket. Clients send
//! `{"type":"start"}`, `{"type":"stop"}` or `{"type":"status"}`; the server
//! sends the current session snapshot on connect and again after every
//! change.

mod client;
mod error;
mod protocol;
mod server;

pub use client::{ControlClient, SnapshotStream};
pub use error::{IpcError, IpcResult};
pub use protocol::ControlRequest;
pub use server::ControlServer;
