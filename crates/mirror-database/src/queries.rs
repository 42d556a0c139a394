//! Standalone query functions. Each takes the `&Connection` first.

use crate::{ActivityTotals, DatabaseResult, NewPurchase, NewTrustLine, Purchase, TrustLine};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

// ==========================================
// Trust lines
// ==========================================

/// Insert a trust line and return its id.
pub fn insert_trust_line(conn: &Connection, trust_line: &NewTrustLine) -> DatabaseResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO trust_lines (id, currency, issuer, limit_amount, tx_hash, test_mode, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            trust_line.currency,
            trust_line.issuer,
            trust_line.limit.to_string(),
            trust_line.tx_hash,
            trust_line.test_mode,
            timestamp(trust_line.created_at),
        ],
    )?;
    debug!(id = %id, currency = %trust_line.currency, "Trust line stored");
    Ok(id)
}

/// Most recent trust lines first.
pub fn list_trust_lines(conn: &Connection, limit: u32) -> DatabaseResult<Vec<TrustLine>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, currency, issuer, limit_amount, tx_hash, test_mode, created_at
         FROM trust_lines ORDER BY created_at DESC LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(TrustLine {
                id: row.get(0)?,
                currency: row.get(1)?,
                issuer: row.get(2)?,
                limit: decimal_column(row, 3)?,
                tx_hash: row.get(4)?,
                test_mode: row.get(5)?,
                created_at: parse_datetime(row.get::<_, String>(6)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ==========================================
// Purchases
// ==========================================

/// Insert a purchase and return its id.
pub fn insert_purchase(conn: &Connection, purchase: &NewPurchase) -> DatabaseResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO purchases (id, currency, issuer, amount, xrp_cost, tx_hash, test_mode, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            purchase.currency,
            purchase.issuer,
            purchase.amount.to_string(),
            purchase.xrp_cost.map(|cost| cost.to_string()),
            purchase.tx_hash,
            purchase.test_mode,
            timestamp(purchase.created_at),
        ],
    )?;
    debug!(id = %id, currency = %purchase.currency, "Purchase stored");
    Ok(id)
}

/// Most recent purchases first.
pub fn list_purchases(conn: &Connection, limit: u32) -> DatabaseResult<Vec<Purchase>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, currency, issuer, amount, xrp_cost, tx_hash, test_mode, created_at
         FROM purchases ORDER BY created_at DESC LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(Purchase {
                id: row.get(0)?,
                currency: row.get(1)?,
                issuer: row.get(2)?,
                amount: decimal_column(row, 3)?,
                xrp_cost: optional_decimal_column(row, 4)?,
                tx_hash: row.get(5)?,
                test_mode: row.get(6)?,
                created_at: parse_datetime(row.get::<_, String>(7)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ==========================================
// Totals
// ==========================================

/// Activity recorded at or after `since`.
pub fn activity_since(conn: &Connection, since: DateTime<Utc>) -> DatabaseResult<ActivityTotals> {
    let since = timestamp(since);

    let trust_lines: u64 = conn.query_row(
        "SELECT COUNT(*) FROM trust_lines WHERE created_at >= ?1",
        params![since],
        |row| row.get(0),
    )?;

    let mut stmt =
        conn.prepare_cached("SELECT xrp_cost FROM purchases WHERE created_at >= ?1")?;
    let costs = stmt
        .query_map(params![since], |row| optional_decimal_column(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ActivityTotals {
        trust_lines,
        purchases: costs.len() as u64,
        xrp_spent: costs.into_iter().flatten().sum(),
    })
}

fn decimal_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(index)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn optional_decimal_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<Decimal>> {
    let text: Option<String> = row.get(index)?;
    text.map(|text| {
        Decimal::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Fixed-width UTC so stored timestamps order lexically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
