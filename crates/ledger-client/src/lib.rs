//! Ledger collaborator for the mirror.
//!
//! The mirror never signs or encodes transactions itself. It hands typed
//! requests to a [`LedgerClient`], which returns a receipt once the
//! transaction is final or an error once it is known to have failed or the
//! submission timeout elapsed.
//!
//! [`RippledSubmitClient`] is the production implementation: it uses the
//! node's sign-and-submit mode and polls until the transaction is validated.

mod account;
mod client;
mod error;
mod rippled;
pub mod transactions;

pub use account::{OperatorAccount, OperatorCredential};
pub use client::{LedgerClient, PurchaseRequest, SubmitReceipt, TrustSetRequest};
pub use error::{LedgerError, LedgerResult};
pub use rippled::{RippledConfig, RippledSubmitClient};
