//! Trust-line mirroring engine.
//!
//! The pipeline for one watched account:
//!
//! ```text
//! Connector ─► RawEvent ─► classify ─► decide ─► ActionExecutor
//!                  ▲                                   │
//!                  └────────── Supervisor ◄────────────┘
//! ```
//!
//! - [`classify`] turns a raw ledger message into a [`ClassifiedEvent`]
//! - [`decide`] is a pure function from an event, the dedup state and the
//!   [`ReactionPolicy`] to a [`ReactionDecision`]
//! - [`ActionExecutor`] submits the mirrored trust line and the follow-up
//!   purchase through the ledger collaborator
//! - [`Supervisor`] owns [`SessionState`] and [`DedupState`], drives the
//!   connection, enforces the heartbeat deadline and applies reconnect backoff
//!
//! Events are processed one at a time on the supervisor task, which is what
//! makes per-currency dedup race free.

mod backoff;
mod classifier;
mod decision;
mod dedup;
mod error;
mod executor;
mod session;
mod store;
mod supervisor;

#[cfg(test)]
mod tests;

pub use backoff::{compute_backoff, ReconnectState};
pub use classifier::{classify, ClassifiedEvent, TrustLineSetEvent, UnknownReason, WatchedAccount};
pub use decision::{clamp_limit, decide, MirrorTrustLine, NoActionReason, ReactionDecision, ReactionPolicy};
pub use dedup::{CurrencyKey, DedupState};
pub use error::{ExecutionError, MalformedEventError, StoreError};
pub use executor::{ActionExecutor, ExecutionOutcome, ExecutorConfig, PurchaseOutcome};
pub use session::{SessionSnapshot, SessionState, SessionStatus, SnapshotFeed};
pub use store::{MirrorStore, PurchaseRecord, RecordingStore, TrustLineRecord};
pub use supervisor::{ControlCommand, Supervisor, SupervisorConfig, SupervisorState};
