//! Database adapter for the engine's storage contract.
//!
//! Bridges executor records to the SQLite history so `history` can show them.

use async_trait::async_trait;
use mirror_database::{queries, AsyncDatabase, DatabaseError, NewPurchase, NewTrustLine};
use mirror_engine::{MirrorStore, PurchaseRecord, StoreError, TrustLineRecord};
use tracing::debug;

/// [`MirrorStore`] backed by the mirror database.
#[derive(Clone)]
pub struct DatabaseStore {
    db: AsyncDatabase,
}

impl DatabaseStore {
    pub fn new(db: AsyncDatabase) -> Self {
        Self { db }
    }
}

fn store_error(error: DatabaseError) -> StoreError {
    match error {
        DatabaseError::Connection(message) => StoreError::Unavailable(message),
        other => StoreError::Write(other.to_string()),
    }
}

#[async_trait]
impl MirrorStore for DatabaseStore {
    async fn record_trust_line(&self, record: &TrustLineRecord) -> Result<(), StoreError> {
        let row = NewTrustLine {
            currency: record.currency.clone(),
            issuer: record.issuer.clone(),
            limit: record.limit,
            tx_hash: record.tx_hash.clone(),
            test_mode: record.test_mode,
            created_at: record.created_at,
        };
        let id = self
            .db
            .call(move |conn| queries::insert_trust_line(conn, &row))
            .await
            .map_err(store_error)?;
        debug!(id = %id, tx_hash = %record.tx_hash, "Trust line recorded");
        Ok(())
    }

    async fn record_purchase(&self, record: &PurchaseRecord) -> Result<(), StoreError> {
        let row = NewPurchase {
            currency: record.currency.clone(),
            issuer: record.issuer.clone(),
            amount: record.amount,
            xrp_cost: record.xrp_cost,
            tx_hash: record.tx_hash.clone(),
            test_mode: record.test_mode,
            created_at: record.created_at,
        };
        let id = self
            .db
            .call(move |conn| queries::insert_purchase(conn, &row))
            .await
            .map_err(store_error)?;
        debug!(id = %id, tx_hash = %record.tx_hash, "Purchase recorded");
        Ok(())
    }
}
