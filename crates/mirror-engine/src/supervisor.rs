//! Liveness supervisor and run state machine.
//!
//! ```text
//! Idle ──start──► Starting ──connected──► Running
//!                    │                     │  stream ended / heartbeat missed
//!                    │ connect failed      ▼
//!                    └──────────────► Reconnecting ──budget exhausted──► Error
//!                                          │
//!                                          └──delay elapsed──► Starting
//! any ──stop──► Stopped ──start──► Starting
//! ```
//!
//! The supervisor task owns the session and the dedup state. Events are
//! handled strictly in arrival order, one at a time; a stop request is
//! honoured between events, never in the middle of an execution.

use crate::{
    classify, decide, ActionExecutor, ClassifiedEvent, DedupState, ReactionDecision,
    ReactionPolicy, ReconnectState, SessionState, SessionStatus, SnapshotFeed, WatchedAccount,
};
use ledger_relay::{Connection, Connector, RawEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

/// Requests from the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    /// A new day began; zero the daily counters.
    ResetDailyCounters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Reconnecting,
    Stopped,
    Error,
}

impl SupervisorState {
    /// Reconnecting has no status of its own; clients see it as starting.
    pub fn session_status(self) -> SessionStatus {
        match self {
            SupervisorState::Idle => SessionStatus::Idle,
            SupervisorState::Starting | SupervisorState::Reconnecting => SessionStatus::Starting,
            SupervisorState::Running => SessionStatus::Running,
            SupervisorState::Stopped => SessionStatus::Stopped,
            SupervisorState::Error => SessionStatus::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub watched: WatchedAccount,
    pub policy: ReactionPolicy,
    /// Longest silence tolerated on a live connection.
    pub heartbeat_deadline: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionExit {
    StreamEnded,
    HeartbeatTimeout,
    StopRequested,
    CommandsClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Stop,
    CommandsClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    Failed,
    CommandsClosed,
}

const TRANSITION_BUFFER: usize = 32;

pub struct Supervisor {
    config: SupervisorConfig,
    connector: Arc<dyn Connector>,
    executor: ActionExecutor,
    session: SessionState,
    dedup: DedupState,
    reconnect: ReconnectState,
    state: SupervisorState,
    feed: SnapshotFeed,
    transitions: broadcast::Sender<SupervisorState>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        connector: Arc<dyn Connector>,
        executor: ActionExecutor,
    ) -> Self {
        let session = SessionState::new(executor.is_test_mode(), config.debug_mode);
        let feed = SnapshotFeed::new(session.snapshot());
        let executor = executor.with_feed(feed.clone());
        let reconnect = ReconnectState::new(
            config.reconnect_base_delay,
            config.reconnect_max_delay,
            config.max_reconnect_attempts,
        );
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);

        Self {
            config,
            connector,
            executor,
            session,
            dedup: DedupState::new(),
            reconnect,
            state: SupervisorState::Idle,
            feed,
            transitions,
        }
    }

    /// Snapshot feed for control clients. Clone before calling [`run`](Self::run).
    pub fn feed(&self) -> SnapshotFeed {
        self.feed.clone()
    }

    /// Every state transition, in order.
    pub fn transitions(&self) -> broadcast::Receiver<SupervisorState> {
        self.transitions.subscribe()
    }

    /// Serve commands until the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<ControlCommand>) {
        info!(watched = %self.config.watched.address(), "Supervisor ready");
        self.publish();

        while let Some(command) = commands.recv().await {
            match command {
                ControlCommand::Start => match self.run_session(&mut commands).await {
                    SessionEnd::CommandsClosed => break,
                    end => debug!(end = ?end, "Session ended"),
                },
                ControlCommand::Stop => debug!(state = ?self.state, "Stop ignored, not running"),
                ControlCommand::ResetDailyCounters => self.reset_daily_counters(),
            }
        }

        info!("Command channel closed, supervisor exiting");
    }

    /// One start-to-stop session, including reconnects.
    async fn run_session(&mut self, commands: &mut mpsc::Receiver<ControlCommand>) -> SessionEnd {
        self.session.start_time = Some(chrono::Utc::now());
        self.session.last_error = None;
        self.reconnect.reset();
        self.transition(SupervisorState::Starting);

        let connector = self.connector.clone();
        loop {
            match self.until_command(connector.connect(), commands).await {
                Err(interrupt) => return self.interrupted(interrupt),
                Ok(Err(e)) => {
                    warn!(error = %e, attempt = self.reconnect.attempt(), "Connection failed");
                    self.session.record_error(format!("Connection failed: {}", e));
                }
                Ok(Ok(connection)) => {
                    info!("Connected, mirroring");
                    self.transition(SupervisorState::Running);
                    match self.run_connection(connection, commands).await {
                        ConnectionExit::StopRequested => return self.interrupted(Interrupt::Stop),
                        ConnectionExit::CommandsClosed => {
                            return self.interrupted(Interrupt::CommandsClosed)
                        }
                        ConnectionExit::StreamEnded => {
                            warn!("Connection lost");
                            self.session.record_error("Connection lost");
                        }
                        ConnectionExit::HeartbeatTimeout => {
                            warn!(deadline = ?self.config.heartbeat_deadline, "No message within heartbeat deadline");
                            self.session.record_error(format!(
                                "No message within {}s",
                                self.config.heartbeat_deadline.as_secs()
                            ));
                        }
                    }
                }
            }

            self.transition(SupervisorState::Reconnecting);
            let Some(delay) = self.reconnect.on_failure() else {
                error!(attempts = self.reconnect.max_attempts(), "Reconnect attempts exhausted");
                self.session.record_error(format!(
                    "Gave up after {} reconnect attempts",
                    self.reconnect.max_attempts()
                ));
                self.transition(SupervisorState::Error);
                return SessionEnd::Failed;
            };

            info!(attempt = self.reconnect.attempt(), delay = ?delay, "Reconnecting");
            if let Err(interrupt) = self.until_command(sleep(delay), commands).await {
                return self.interrupted(interrupt);
            }
            self.transition(SupervisorState::Starting);
        }
    }

    async fn run_connection(
        &mut self,
        mut connection: Connection,
        commands: &mut mpsc::Receiver<ControlCommand>,
    ) -> ConnectionExit {
        let heartbeat = self.config.heartbeat_deadline;
        let mut deadline = Instant::now() + heartbeat;

        let exit = loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(ControlCommand::Stop) => break ConnectionExit::StopRequested,
                    Some(ControlCommand::Start) => debug!("Start ignored, already running"),
                    Some(ControlCommand::ResetDailyCounters) => self.reset_daily_counters(),
                    None => break ConnectionExit::CommandsClosed,
                },

                event = connection.next_event() => match event {
                    Some(raw) => {
                        self.reconnect.reset();
                        deadline = Instant::now() + heartbeat;
                        self.dispatch(raw).await;
                    }
                    None => break ConnectionExit::StreamEnded,
                },

                _ = sleep_until(deadline) => break ConnectionExit::HeartbeatTimeout,
            }
        };

        connection.close().await;
        exit
    }

    async fn dispatch(&mut self, raw: RawEvent) {
        let event = match classify(&raw, &self.config.watched) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                return;
            }
        };

        let trust_line = match &event {
            ClassifiedEvent::TrustLineSet(trust_line) => trust_line,
            ClassifiedEvent::Heartbeat => return,
            ClassifiedEvent::Unknown(reason) => {
                trace!(reason = ?reason, "Ignoring message");
                return;
            }
        };
        info!(
            currency = %trust_line.key.currency,
            issuer = %trust_line.key.issuer,
            limit = %trust_line.requested_limit,
            "Watched account set a trust line"
        );

        let action = match decide(&event, &self.dedup, &self.config.policy) {
            ReactionDecision::Mirror(action) => action,
            ReactionDecision::NoAction { key, reason } => {
                let key = key.as_ref().unwrap_or(&trust_line.key);
                info!(currency = %key.currency, issuer = %key.issuer, reason = ?reason, "Not mirroring");
                return;
            }
        };

        match self
            .executor
            .execute(&action, &mut self.dedup, &mut self.session)
            .await
        {
            Ok(outcome) => debug!(outcome = ?outcome, "Mirror complete"),
            Err(e) => error!(error = %e, "Mirror failed"),
        }
        self.publish();
    }

    /// Drive `work` to completion while still serving control commands.
    async fn until_command<F: Future>(
        &mut self,
        work: F,
        commands: &mut mpsc::Receiver<ControlCommand>,
    ) -> Result<F::Output, Interrupt> {
        tokio::pin!(work);
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(ControlCommand::Stop) => return Err(Interrupt::Stop),
                    Some(ControlCommand::Start) => debug!("Start ignored, already starting"),
                    Some(ControlCommand::ResetDailyCounters) => self.reset_daily_counters(),
                    None => return Err(Interrupt::CommandsClosed),
                },

                output = &mut work => return Ok(output),
            }
        }
    }

    fn interrupted(&mut self, interrupt: Interrupt) -> SessionEnd {
        self.transition(SupervisorState::Stopped);
        match interrupt {
            Interrupt::Stop => {
                info!("Stopped");
                SessionEnd::Stopped
            }
            Interrupt::CommandsClosed => SessionEnd::CommandsClosed,
        }
    }

    fn reset_daily_counters(&mut self) {
        info!(
            trust_lines = self.session.trust_lines_today,
            transactions = self.session.transactions_today,
            "Resetting daily counters"
        );
        self.session.reset_daily_counters();
        self.publish();
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "State transition");
            self.state = next;
            let _ = self.transitions.send(next);
        }
        self.session.status = next.session_status();
        self.publish();
    }

    fn publish(&self) {
        self.feed.publish(self.session.snapshot());
    }
}
