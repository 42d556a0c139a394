//! Mirror initialization.

use crate::app::rollover::run_day_rollover;
use crate::store_adapter::DatabaseStore;
use ledger_client::{OperatorAccount, OperatorCredential, RippledConfig, RippledSubmitClient};
use ledger_relay::{RelayClient, RelayConfig};
use mirror_config_and_utils::{Config, Paths, LOCAL_SUBMIT_URL};
use mirror_database::AsyncDatabase;
use mirror_engine::{
    ActionExecutor, ControlCommand, ExecutorConfig, ReactionPolicy, Supervisor,
    SupervisorConfig, WatchedAccount,
};
use mirror_ipc::{ControlClient, ControlServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const COMMAND_BUFFER: usize = 32;
/// Extra time granted to an in-flight execution on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the mirror until interrupted.
pub async fn run_mirror(
    config: Config,
    paths: Paths,
    autostart: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    // Singleton enforcement: check if a mirror is already running
    let socket_path = paths.socket_file();
    if socket_path.exists() {
        if ControlClient::new(&socket_path).is_running().await {
            eprintln!(
                "Error: trustline-mirror is already running. Use 'trustline-mirror stop' or stop that process first."
            );
            std::process::exit(1);
        }
        eprintln!("Removing stale socket file");
        let _ = std::fs::remove_file(&socket_path);
    }

    // Clean up stale PID file if it exists
    let pid_file = paths.pid_file();
    if pid_file.exists() {
        let _ = std::fs::remove_file(&pid_file);
    }

    info!("Starting trustline-mirror");
    info!(
        websocket_url = %config.network.websocket_url,
        submit_url = ?config.network.submit_endpoint(),
        target_account = %config.wallets.target_account,
        operator_address = %config.wallets.operator_address,
        test_mode = config.test_mode,
        watch_only = config.trading.watch_only,
        "Configuration loaded"
    );

    paths.ensure_dirs()?;

    let pid = std::process::id();
    std::fs::write(&pid_file, pid.to_string())?;
    info!(pid = pid, "Mirror process started");

    let db = AsyncDatabase::open(&paths.database_file())
        .await
        .map_err(|e| format!("Failed to open database: {}", e))?;

    let supervisor = build_supervisor(&config, db.clone())?;
    let feed = supervisor.feed();

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let supervisor_task = tokio::spawn(supervisor.run(commands_rx));
    let rollover_task = tokio::spawn(run_day_rollover(commands_tx.clone()));

    if autostart {
        commands_tx.send(ControlCommand::Start).await?;
    }

    let server = ControlServer::new(&socket_path, feed, commands_tx.clone());
    info!(socket = %socket_path.display(), "Control server starting");

    let server_result = tokio::select! {
        result = server.run() => result,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Interrupt received, shutting down"),
                Err(e) => warn!(error = %e, "Signal handler failed, shutting down"),
            }
            server.shutdown();
            Ok(())
        }
    };

    // Let an in-flight execution finish before the supervisor exits
    let _ = commands_tx.send(ControlCommand::Stop).await;
    rollover_task.abort();
    drop(server);
    drop(commands_tx);

    let grace = config.network.submit_timeout() * 2 + SHUTDOWN_GRACE;
    if tokio::time::timeout(grace, supervisor_task).await.is_err() {
        warn!(grace_secs = grace.as_secs(), "Supervisor did not stop in time");
    }

    if let Err(e) = db.close().await {
        warn!(error = %e, "Failed to close database");
    }

    // Cleanup
    let _ = std::fs::remove_file(paths.pid_file());
    let _ = std::fs::remove_file(paths.socket_file());

    info!("Mirror stopped");

    server_result.map_err(|e| e.into())
}

/// Wire the engine to the live ledger and the database.
fn build_supervisor(
    config: &Config,
    db: AsyncDatabase,
) -> Result<Supervisor, Box<dyn std::error::Error>> {
    let network = &config.network;
    let wallets = &config.wallets;
    let trading = &config.trading;

    let seed = wallets
        .operator_seed
        .clone()
        .ok_or("operator seed is missing")?;
    let operator = OperatorAccount::new(&wallets.operator_address, OperatorCredential::new(seed));

    let relay = RelayClient::new(RelayConfig {
        url: network.websocket_url.clone(),
        accounts: vec![wallets.target_account.clone()],
        streams: vec!["ledger".to_string()],
        connect_timeout: network.connect_timeout(),
        subscribe_timeout: network.subscribe_timeout(),
        keepalive_interval: network.keepalive_interval(),
    });

    // Without a node only test mode validates, and it never submits
    let ledger = RippledSubmitClient::new(RippledConfig {
        url: network
            .submit_endpoint()
            .unwrap_or(LOCAL_SUBMIT_URL)
            .to_string(),
        submit_timeout: network.submit_timeout(),
        ..RippledConfig::default()
    });

    let executor = ActionExecutor::new(
        operator,
        Arc::new(ledger),
        Arc::new(DatabaseStore::new(db)),
        ExecutorConfig {
            purchase_amount: trading.initial_purchase_amount,
            send_max_xrp: trading.send_max_xrp,
            slippage_percent: trading.slippage_percent,
            submit_timeout: network.submit_timeout(),
            test_mode: config.test_mode,
        },
    );

    let supervisor_config = SupervisorConfig {
        watched: WatchedAccount::new(&wallets.target_account),
        policy: ReactionPolicy {
            min_trust_line_amount: trading.min_trust_line_amount,
            max_trust_line_amount: trading.max_trust_line_amount,
            watch_only: trading.watch_only,
        },
        heartbeat_deadline: network.heartbeat_deadline(),
        reconnect_base_delay: network.reconnect_base_delay(),
        reconnect_max_delay: network.reconnect_max_delay(),
        max_reconnect_attempts: network.max_reconnect_attempts,
        debug_mode: config.debug_mode,
    };

    Ok(Supervisor::new(supervisor_config, Arc::new(relay), executor))
}
