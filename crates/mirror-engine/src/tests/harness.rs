//! Test harness for mirror engine tests.
//!
//! Provides:
//! - ScriptedConnector: hands out queued event streams or connect failures
//! - MockLedger: records submissions, fails or hangs on request
//! - TestHarness: runs a Supervisor against both with a RecordingStore

use crate::{
    ActionExecutor, ControlCommand, ExecutorConfig, ReactionPolicy, RecordingStore,
    SessionSnapshot, SnapshotFeed, Supervisor, SupervisorConfig, SupervisorState, WatchedAccount,
};
use async_trait::async_trait;
use ledger_client::{
    LedgerClient, LedgerError, LedgerResult, OperatorAccount, OperatorCredential,
    PurchaseRequest, SubmitReceipt, TrustSetRequest,
};
use ledger_relay::{Connection, Connector, RawEvent, RelayError, RelayResult};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

pub const WATCHED: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
pub const OPERATOR: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
pub const ISSUER: &str = "rsA2LpzuawewSBQXkiju3YQTMzW13pAAdW";
pub const STRANGER: &str = "rf1BiGeXwwQoi8Z2ueFYTEXSwuJYfV2Jpn";

/// Long enough to cover a full backoff sequence on the paused clock.
pub const WAIT: Duration = Duration::from_secs(600);

// =============================================================================
// Events
// =============================================================================

pub fn trust_set(account: &str, currency: &str, issuer: &str, value: &str) -> RawEvent {
    RawEvent::new(
        json!({
            "type": "transaction",
            "validated": true,
            "engine_result": "tesSUCCESS",
            "transaction": {
                "TransactionType": "TrustSet",
                "Account": account,
                "LimitAmount": {"currency": currency, "issuer": issuer, "value": value},
                "hash": format!("{}-{}-{}", account, currency, value),
            }
        })
        .to_string(),
    )
}

/// A TrustSet by the watched account against [`ISSUER`].
pub fn watched_trust_set(currency: &str, value: &str) -> RawEvent {
    trust_set(WATCHED, currency, ISSUER, value)
}

pub fn ledger_closed(index: u64) -> RawEvent {
    RawEvent::new(json!({"type": "ledgerClosed", "ledger_index": index}).to_string())
}

// =============================================================================
// ScriptedConnector
// =============================================================================

pub enum Script {
    Fail,
    Stream(mpsc::Receiver<RawEvent>),
}

/// Serves queued scripts in order; fails once the queue is empty.
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<Instant>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_failures(&self, count: usize) {
        let mut script = self.script.lock();
        for _ in 0..count {
            script.push_back(Script::Fail);
        }
    }

    /// Queue a successful connection and return its event feed.
    ///
    /// Dropping the sender ends the stream.
    pub fn push_stream(&self) -> mpsc::Sender<RawEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.script.lock().push_back(Script::Stream(rx));
        tx
    }

    /// Time of every connect call so far.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> RelayResult<Connection> {
        self.attempts.lock().push(Instant::now());
        let next = self.script.lock().pop_front();
        match next {
            Some(Script::Stream(events)) => Ok(Connection::from_receiver(events)),
            Some(Script::Fail) | None => {
                Err(RelayError::Connection("scripted failure".to_string()))
            }
        }
    }
}

// =============================================================================
// MockLedger
// =============================================================================

#[derive(Default)]
pub struct MockLedger {
    trust_sets: Mutex<Vec<TrustSetRequest>>,
    purchases: Mutex<Vec<PurchaseRequest>>,
    fail_trust_set: AtomicBool,
    fail_purchase: AtomicBool,
    hang: AtomicBool,
    hang_purchase: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_trust_set(&self, fail: bool) {
        self.fail_trust_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_purchase(&self, fail: bool) {
        self.fail_purchase.store(fail, Ordering::SeqCst);
    }

    /// Never answer any submission.
    pub fn hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Answer trust lines but never answer a purchase.
    pub fn hang_purchase(&self, hang: bool) {
        self.hang_purchase.store(hang, Ordering::SeqCst);
    }

    pub fn trust_sets(&self) -> Vec<TrustSetRequest> {
        self.trust_sets.lock().clone()
    }

    pub fn purchases(&self) -> Vec<PurchaseRequest> {
        self.purchases.lock().clone()
    }

    async fn maybe_hang(&self) {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit_trust_set(
        &self,
        operator: &OperatorAccount,
        request: &TrustSetRequest,
    ) -> LedgerResult<SubmitReceipt> {
        assert_eq!(operator.address, OPERATOR);
        self.maybe_hang().await;
        let count = {
            let mut trust_sets = self.trust_sets.lock();
            trust_sets.push(request.clone());
            trust_sets.len()
        };
        if self.fail_trust_set.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected {
                code: "tecNO_LINE_INSUF_RESERVE".to_string(),
                message: "Insufficient reserve to create line.".to_string(),
            });
        }
        Ok(SubmitReceipt {
            tx_hash: format!("TRUST{}", count),
            xrp_cost: Some(dec!(0.000012)),
        })
    }

    async fn submit_purchase(
        &self,
        operator: &OperatorAccount,
        request: &PurchaseRequest,
    ) -> LedgerResult<SubmitReceipt> {
        assert_eq!(operator.address, OPERATOR);
        self.maybe_hang().await;
        if self.hang_purchase.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let count = {
            let mut purchases = self.purchases.lock();
            purchases.push(request.clone());
            purchases.len()
        };
        if self.fail_purchase.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected {
                code: "tecPATH_PARTIAL".to_string(),
                message: "Path could not send partial amount.".to_string(),
            });
        }
        Ok(SubmitReceipt {
            tx_hash: format!("PAY{}", count),
            xrp_cost: Some(dec!(84.5)),
        })
    }
}

// =============================================================================
// Configuration
// =============================================================================

pub fn operator() -> OperatorAccount {
    OperatorAccount::new(
        OPERATOR,
        OperatorCredential::new("snoPBrXtMeMyMHUVTgbuqAfg1SUTb"),
    )
}

pub fn executor_config(test_mode: bool) -> ExecutorConfig {
    ExecutorConfig {
        purchase_amount: dec!(1),
        send_max_xrp: dec!(85),
        slippage_percent: dec!(5),
        submit_timeout: Duration::from_secs(30),
        test_mode,
    }
}

pub fn executor(
    ledger: Arc<MockLedger>,
    store: Arc<RecordingStore>,
    test_mode: bool,
) -> ActionExecutor {
    ActionExecutor::new(operator(), ledger, store, executor_config(test_mode))
}

pub fn supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        watched: WatchedAccount::new(WATCHED),
        policy: ReactionPolicy {
            min_trust_line_amount: dec!(1000),
            max_trust_line_amount: dec!(10000),
            watch_only: false,
        },
        heartbeat_deadline: Duration::from_secs(30),
        reconnect_base_delay: Duration::from_secs(1),
        reconnect_max_delay: Duration::from_secs(30),
        max_reconnect_attempts: 5,
        debug_mode: false,
    }
}

// =============================================================================
// TestHarness
// =============================================================================

/// A running supervisor plus handles to everything it talks to.
pub struct TestHarness {
    pub connector: Arc<ScriptedConnector>,
    pub ledger: Arc<MockLedger>,
    pub store: Arc<RecordingStore>,
    pub feed: SnapshotFeed,
    commands: mpsc::Sender<ControlCommand>,
    transitions: broadcast::Receiver<SupervisorState>,
    task: JoinHandle<()>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(supervisor_config(), false)
    }

    pub fn with_config(config: SupervisorConfig, test_mode: bool) -> Self {
        let connector = ScriptedConnector::new();
        let ledger = MockLedger::new();
        let store = Arc::new(RecordingStore::new());

        let supervisor = Supervisor::new(
            config,
            connector.clone(),
            executor(ledger.clone(), store.clone(), test_mode),
        );
        let feed = supervisor.feed();
        let transitions = supervisor.transitions();
        let (commands, rx) = mpsc::channel(16);
        let task = tokio::spawn(supervisor.run(rx));

        Self {
            connector,
            ledger,
            store,
            feed,
            commands,
            transitions,
            task,
        }
    }

    pub async fn send(&self, command: ControlCommand) {
        self.commands.send(command).await.unwrap();
    }

    pub async fn start(&self) {
        self.send(ControlCommand::Start).await;
    }

    pub async fn stop(&self) {
        self.send(ControlCommand::Stop).await;
    }

    /// Wait until the latest snapshot satisfies `condition`.
    pub async fn wait_for<F>(&self, condition: F) -> SessionSnapshot
    where
        F: Fn(&SessionSnapshot) -> bool,
    {
        let mut latest = self.feed.watch();
        timeout(WAIT, async {
            loop {
                {
                    let snapshot = latest.borrow_and_update();
                    if condition(&*snapshot) {
                        return (*snapshot).clone();
                    }
                }
                latest.changed().await.unwrap();
            }
        })
        .await
        .expect("snapshot condition not reached")
    }

    /// Wait for the next transition into `state`.
    pub async fn wait_for_state(&mut self, state: SupervisorState) {
        timeout(WAIT, async {
            loop {
                match self.transitions.recv().await {
                    Ok(next) if next == state => return,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        panic!("supervisor exited before reaching {:?}", state)
                    }
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {:?}", state))
    }

    /// Close the command channel and wait for the supervisor to exit.
    pub async fn shutdown(self) {
        drop(self.commands);
        timeout(WAIT, self.task)
            .await
            .expect("supervisor did not exit")
            .unwrap();
    }
}
