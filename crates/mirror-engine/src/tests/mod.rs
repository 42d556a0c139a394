//! Scenario tests for the mirror engine.
//!
//! - `harness.rs`   - Scripted connector, mock ledger and a supervisor runner
//! - `mirroring.rs` - Event to trust line: clamping, dedup, watched account, test mode
//! - `execution.rs` - Executor step semantics: purchase failure, trust line failure,
//!                    storage failure, hung submissions
//! - `liveness.rs`  - Heartbeat deadline, reconnect backoff, attempt budget
//! - `control.rs`   - Start, stop and daily reset commands

pub(crate) mod harness;
