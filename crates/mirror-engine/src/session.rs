//! Session counters and the snapshot feed control clients observe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Externally visible run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Starting,
    Running,
    Error,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Starting => "starting",
            SessionStatus::Running => "running",
            SessionStatus::Error => "error",
            SessionStatus::Stopped => "stopped",
        }
    }
}

/// Mutable session data, owned by the supervisor task.
///
/// Counters persist across reconnects and across stop/start; they are only
/// cleared by a daily reset.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: SessionStatus,
    pub trust_lines_today: u64,
    pub transactions_today: u64,
    pub last_transaction: Option<String>,
    pub last_error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub test_mode: bool,
    pub debug_mode: bool,
}

impl SessionState {
    pub fn new(test_mode: bool, debug_mode: bool) -> Self {
        Self {
            status: SessionStatus::Idle,
            trust_lines_today: 0,
            transactions_today: 0,
            last_transaction: None,
            last_error: None,
            start_time: None,
            test_mode,
            debug_mode,
        }
    }

    pub fn record_trust_line(&mut self, tx_hash: &str) {
        self.trust_lines_today += 1;
        self.transactions_today += 1;
        self.last_transaction = Some(format!("TrustSet: Hash={}", tx_hash));
    }

    pub fn record_purchase(&mut self, tx_hash: &str) {
        self.transactions_today += 1;
        self.last_transaction = Some(format!("Payment: Hash={}", tx_hash));
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn reset_daily_counters(&mut self) {
        self.trust_lines_today = 0;
        self.transactions_today = 0;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            trust_lines_today: self.trust_lines_today,
            transactions_today: self.transactions_today,
            last_transaction: self.last_transaction.clone(),
            last_error: self.last_error.clone(),
            start_time: self.start_time,
            test_mode: self.test_mode,
            debug_mode: self.debug_mode,
        }
    }
}

/// Point-in-time copy of [`SessionState`], as sent to control clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub trust_lines_today: u64,
    pub transactions_today: u64,
    pub last_transaction: Option<String>,
    pub last_error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub test_mode: bool,
    pub debug_mode: bool,
}

const CHANGE_BUFFER: usize = 64;

/// Latest snapshot plus a stream of every published change.
///
/// Cloned into each consumer. Readers never block the supervisor: the
/// latest value is replaced in place and lagging change subscribers skip.
#[derive(Clone)]
pub struct SnapshotFeed {
    latest: Arc<watch::Sender<SessionSnapshot>>,
    changes: broadcast::Sender<SessionSnapshot>,
}

impl SnapshotFeed {
    pub fn new(initial: SessionSnapshot) -> Self {
        let (latest, _) = watch::channel(initial);
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            latest: Arc::new(latest),
            changes,
        }
    }

    pub fn publish(&self, snapshot: SessionSnapshot) {
        self.latest.send_replace(snapshot.clone());
        // No subscribers is fine
        let _ = self.changes.send(snapshot);
    }

    pub fn current(&self) -> SessionSnapshot {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.changes.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.latest.subscribe()
    }
}
