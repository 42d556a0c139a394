//! Storage collaborator contract.
//!
//! The executor persists a record after each successful step. A failed
//! write is reported on the session but never undoes the ledger action.

use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};

/// A trust line the operator established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustLineRecord {
    pub currency: String,
    pub issuer: String,
    pub limit: Decimal,
    pub tx_hash: String,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

/// A purchase that followed a mirrored trust line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub currency: String,
    pub issuer: String,
    pub amount: Decimal,
    /// Net XRP spent, fee included. Unknown in test mode.
    pub xrp_cost: Option<Decimal>,
    pub tx_hash: String,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn record_trust_line(&self, record: &TrustLineRecord) -> Result<(), StoreError>;

    async fn record_purchase(&self, record: &PurchaseRecord) -> Result<(), StoreError>;
}

/// Keeps records in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingStore {
    trust_lines: Mutex<Vec<TrustLineRecord>>,
    purchases: Mutex<Vec<PurchaseRecord>>,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn trust_lines(&self) -> Vec<TrustLineRecord> {
        self.trust_lines.lock().clone()
    }

    pub fn purchases(&self) -> Vec<PurchaseRecord> {
        self.purchases.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.trust_lines.lock().is_empty() && self.purchases.lock().is_empty()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write("recording store is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MirrorStore for RecordingStore {
    async fn record_trust_line(&self, record: &TrustLineRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.trust_lines.lock().push(record.clone());
        Ok(())
    }

    async fn record_purchase(&self, record: &PurchaseRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.purchases.lock().push(record.clone());
        Ok(())
    }
}
