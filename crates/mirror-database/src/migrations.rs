//! Database migrations.
//!
//! Migrations run in order and are tracked in the `migrations` table.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_initial_schema(conn)?;
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: trust lines and purchases.
///
/// Amounts are stored as decimal strings to keep ledger precision.
fn migrate_v1_initial_schema(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: initial schema");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS trust_lines (
            id TEXT PRIMARY KEY,
            currency TEXT NOT NULL,
            issuer TEXT NOT NULL,
            limit_amount TEXT NOT NULL,
            tx_hash TEXT NOT NULL,
            test_mode INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_trust_lines_created_at
            ON trust_lines(created_at);

        CREATE TABLE IF NOT EXISTS purchases (
            id TEXT PRIMARY KEY,
            currency TEXT NOT NULL,
            issuer TEXT NOT NULL,
            amount TEXT NOT NULL,
            xrp_cost TEXT,
            tx_hash TEXT NOT NULL,
            test_mode INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_purchases_created_at
            ON purchases(created_at);
        ",
    )?;

    record_migration(conn, 1, "initial_schema")
}
