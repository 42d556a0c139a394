//! Database model types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trust line to insert.
#[derive(Debug, Clone)]
pub struct NewTrustLine {
    pub currency: String,
    pub issuer: String,
    pub limit: Decimal,
    pub tx_hash: String,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored trust line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLine {
    pub id: String,
    pub currency: String,
    pub issuer: String,
    pub limit: Decimal,
    pub tx_hash: String,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

/// A purchase to insert.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub currency: String,
    pub issuer: String,
    pub amount: Decimal,
    pub xrp_cost: Option<Decimal>,
    pub tx_hash: String,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub currency: String,
    pub issuer: String,
    pub amount: Decimal,
    pub xrp_cost: Option<Decimal>,
    pub tx_hash: String,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

/// Activity totals over a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityTotals {
    pub trust_lines: u64,
    pub purchases: u64,
    /// Sum of known purchase costs.
    pub xrp_spent: Decimal,
}
