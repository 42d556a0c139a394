//! Commands against a running mirror (start, stop, status) and its history.

use crate::app::rollover::start_of_today;
use mirror_config_and_utils::Paths;
use mirror_database::{queries, AsyncDatabase};
use mirror_engine::SessionSnapshot;
use mirror_ipc::{ControlClient, ControlRequest};

fn not_running(paths: &Paths) -> bool {
    if paths.socket_file().exists() {
        return false;
    }
    println!("trustline-mirror is not running (socket not found)");
    let pid_path = paths.pid_file();
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }
    true
}

/// Ask the mirror to start watching.
pub async fn start_mirror(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    send(paths, ControlRequest::Start).await
}

/// Ask the mirror to stop watching. The process keeps serving the control socket.
pub async fn stop_mirror(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    send(paths, ControlRequest::Stop).await
}

async fn send(paths: &Paths, request: ControlRequest) -> Result<(), Box<dyn std::error::Error>> {
    if not_running(paths) {
        return Ok(());
    }

    let client = ControlClient::new(paths.socket_file());
    match client.send(request).await {
        Ok(snapshot) => {
            println!("Request sent");
            print_snapshot(&snapshot);
        }
        Err(e) => println!("Failed to connect to trustline-mirror: {}", e),
    }
    Ok(())
}

/// Print the session, and with `follow` every change after it.
pub async fn check_status(paths: &Paths, follow: bool) -> Result<(), Box<dyn std::error::Error>> {
    if not_running(paths) {
        return Ok(());
    }

    let client = ControlClient::new(paths.socket_file());
    if !follow {
        match client.status().await {
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(e) => println!("trustline-mirror is not responding: {}", e),
        }
        return Ok(());
    }

    let mut stream = client.subscribe().await?;
    while let Some(snapshot) = stream.next().await? {
        print_snapshot(&snapshot);
        println!();
    }
    println!("Connection closed");
    Ok(())
}

/// Print recent trust lines and purchases, plus today's totals.
pub async fn show_history(paths: &Paths, limit: u32) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = paths.database_file();
    if !db_path.exists() {
        println!("No history yet ({} not found)", db_path.display());
        return Ok(());
    }

    let db = AsyncDatabase::open(&db_path).await?;
    let since = start_of_today();
    let (trust_lines, purchases, today) = db
        .call(move |conn| {
            Ok((
                queries::list_trust_lines(conn, limit)?,
                queries::list_purchases(conn, limit)?,
                queries::activity_since(conn, since)?,
            ))
        })
        .await?;

    println!("Today:");
    println!("  Trust lines: {}", today.trust_lines);
    println!("  Purchases:   {}", today.purchases);
    println!("  XRP spent:   {}", today.xrp_spent);

    println!();
    println!("Trust lines:");
    if trust_lines.is_empty() {
        println!("  (none)");
    }
    for line in &trust_lines {
        println!(
            "  {}  {}:{}  limit {}  {}{}",
            line.created_at.format("%Y-%m-%d %H:%M:%S"),
            line.currency,
            line.issuer,
            line.limit,
            line.tx_hash,
            if line.test_mode { "  [test]" } else { "" },
        );
    }

    println!();
    println!("Purchases:");
    if purchases.is_empty() {
        println!("  (none)");
    }
    for purchase in &purchases {
        let cost = purchase
            .xrp_cost
            .map(|cost| format!("{} XRP", cost))
            .unwrap_or_else(|| "cost unknown".to_string());
        println!(
            "  {}  {} {}:{}  {}  {}{}",
            purchase.created_at.format("%Y-%m-%d %H:%M:%S"),
            purchase.amount,
            purchase.currency,
            purchase.issuer,
            cost,
            purchase.tx_hash,
            if purchase.test_mode { "  [test]" } else { "" },
        );
    }

    db.close().await?;
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!("{:<20}{}", "Status:", snapshot.status.as_str());
    println!("{:<20}{}", "Trust lines today:", snapshot.trust_lines_today);
    println!("{:<20}{}", "Transactions today:", snapshot.transactions_today);
    if let Some(start) = snapshot.start_time {
        println!("{:<20}{}", "Started:", start.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(tx) = &snapshot.last_transaction {
        println!("{:<20}{}", "Last transaction:", tx);
    }
    if let Some(error) = &snapshot.last_error {
        println!("{:<20}{}", "Last error:", error);
    }
    if snapshot.test_mode {
        println!("{:<20}test", "Mode:");
    }
    if snapshot.debug_mode {
        println!("{:<20}on", "Debug:");
    }
}
