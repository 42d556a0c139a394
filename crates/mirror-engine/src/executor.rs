//! Mirror execution: trust line first, then a best-effort purchase.

use crate::{
    CurrencyKey, DedupState, ExecutionError, MirrorStore, MirrorTrustLine, PurchaseRecord,
    SessionState, SnapshotFeed, TrustLineRecord,
};
use chrono::Utc;
use ledger_client::{
    LedgerClient, LedgerError, LedgerResult, OperatorAccount, PurchaseRequest, SubmitReceipt,
    TrustSetRequest,
};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Amount of the new currency bought after each trust line.
    pub purchase_amount: Decimal,
    pub send_max_xrp: Decimal,
    pub slippage_percent: Decimal,
    /// Upper bound on each ledger submission.
    pub submit_timeout: Duration,
    /// Simulate submissions instead of calling the ledger.
    pub test_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Completed {
        tx_hash: String,
        xrp_cost: Option<Decimal>,
    },
    Failed {
        reason: String,
    },
}

/// Result of a mirror whose trust line was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub key: CurrencyKey,
    pub trust_line_tx: String,
    pub purchase: PurchaseOutcome,
}

pub struct ActionExecutor {
    operator: OperatorAccount,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn MirrorStore>,
    config: ExecutorConfig,
    feed: Option<SnapshotFeed>,
}

impl ActionExecutor {
    pub fn new(
        operator: OperatorAccount,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn MirrorStore>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            operator,
            ledger,
            store,
            config,
            feed: None,
        }
    }

    /// Publish the session to `feed` as soon as a trust line is established,
    /// before the purchase is submitted.
    pub fn with_feed(mut self, feed: SnapshotFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn is_test_mode(&self) -> bool {
        self.config.test_mode
    }

    /// Carry out one mirror decision.
    ///
    /// The dedup entry is inserted only once the trust line succeeded. A
    /// failed purchase is reported on the session and in the outcome but
    /// does not fail the call. Neither step is retried.
    pub async fn execute(
        &self,
        action: &MirrorTrustLine,
        dedup: &mut DedupState,
        session: &mut SessionState,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let key = &action.key;
        info!(
            currency = %key.currency,
            issuer = %key.issuer,
            requested = %action.requested_limit,
            limit = %action.limit,
            source_tx = action.source_tx.as_deref().unwrap_or("-"),
            test_mode = self.config.test_mode,
            "Mirroring trust line"
        );

        let request = TrustSetRequest {
            currency: key.currency.clone(),
            issuer: key.issuer.clone(),
            limit: action.limit,
        };
        let receipt = if self.config.test_mode {
            simulated_receipt()
        } else {
            match self
                .bounded(self.ledger.submit_trust_set(&self.operator, &request))
                .await
            {
                Ok(receipt) => receipt,
                Err(source) => {
                    error!(currency = %key.currency, issuer = %key.issuer, error = %source, "Trust line failed");
                    session.record_error(format!("TrustSet {} failed: {}", key, source));
                    return Err(ExecutionError::TrustLine {
                        key: key.clone(),
                        source,
                    });
                }
            }
        };

        dedup.insert(key.clone());
        session.record_trust_line(&receipt.tx_hash);
        info!(currency = %key.currency, issuer = %key.issuer, tx_hash = %receipt.tx_hash, "Trust line established");

        let record = TrustLineRecord {
            currency: key.currency.clone(),
            issuer: key.issuer.clone(),
            limit: action.limit,
            tx_hash: receipt.tx_hash.clone(),
            test_mode: self.config.test_mode,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.record_trust_line(&record).await {
            warn!(currency = %key.currency, error = %e, "Failed to persist trust line");
            session.record_error(format!("Failed to persist trust line {}: {}", key, e));
        }
        if let Some(feed) = &self.feed {
            feed.publish(session.snapshot());
        }

        let purchase = self.purchase(key, session).await;

        Ok(ExecutionOutcome {
            key: key.clone(),
            trust_line_tx: receipt.tx_hash,
            purchase,
        })
    }

    async fn purchase(&self, key: &CurrencyKey, session: &mut SessionState) -> PurchaseOutcome {
        let request = PurchaseRequest {
            currency: key.currency.clone(),
            issuer: key.issuer.clone(),
            amount: self.config.purchase_amount,
            send_max_xrp: self.config.send_max_xrp,
            slippage_percent: self.config.slippage_percent,
        };

        let result = if self.config.test_mode {
            Ok(simulated_receipt())
        } else {
            self.bounded(self.ledger.submit_purchase(&self.operator, &request))
                .await
        };

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(currency = %key.currency, issuer = %key.issuer, error = %e, "Purchase failed, trust line kept");
                session.record_error(format!("Payment {} failed: {}", key, e));
                return PurchaseOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        session.record_purchase(&receipt.tx_hash);
        info!(
            currency = %key.currency,
            amount = %request.amount,
            tx_hash = %receipt.tx_hash,
            xrp_cost = ?receipt.xrp_cost,
            "Purchase completed"
        );

        let record = PurchaseRecord {
            currency: key.currency.clone(),
            issuer: key.issuer.clone(),
            amount: request.amount,
            xrp_cost: receipt.xrp_cost,
            tx_hash: receipt.tx_hash.clone(),
            test_mode: self.config.test_mode,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.record_purchase(&record).await {
            warn!(currency = %key.currency, error = %e, "Failed to persist purchase");
            session.record_error(format!("Failed to persist purchase {}: {}", key, e));
        }

        PurchaseOutcome::Completed {
            tx_hash: receipt.tx_hash,
            xrp_cost: receipt.xrp_cost,
        }
    }

    async fn bounded<F>(&self, submission: F) -> LedgerResult<SubmitReceipt>
    where
        F: Future<Output = LedgerResult<SubmitReceipt>>,
    {
        match timeout(self.config.submit_timeout, submission).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.config.submit_timeout)),
        }
    }
}

fn simulated_receipt() -> SubmitReceipt {
    SubmitReceipt {
        tx_hash: format!("SIMULATED-{}", uuid::Uuid::new_v4().simple()).to_uppercase(),
        xrp_cost: None,
    }
}
