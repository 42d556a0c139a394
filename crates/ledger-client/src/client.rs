//! Collaborator interface.

use crate::{LedgerResult, OperatorAccount};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Establish (or change) a trust line from the operator to an issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustSetRequest {
    pub currency: String,
    pub issuer: String,
    pub limit: Decimal,
}

/// Buy `amount` of an issued currency with XRP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub currency: String,
    pub issuer: String,
    pub amount: Decimal,
    /// Most XRP the purchase may spend.
    pub send_max_xrp: Decimal,
    /// Accepted shortfall of the delivered amount, in percent.
    pub slippage_percent: Decimal,
}

/// Outcome of a validated, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub tx_hash: String,
    /// Net XRP that left the operator account, fee included, when known.
    pub xrp_cost: Option<Decimal>,
}

/// Signs, submits and confirms transactions for the operator account.
///
/// Implementations bound every call with their own timeout; a call that
/// returns has either succeeded on a validated ledger or failed.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit_trust_set(
        &self,
        operator: &OperatorAccount,
        request: &TrustSetRequest,
    ) -> LedgerResult<SubmitReceipt>;

    async fn submit_purchase(
        &self,
        operator: &OperatorAccount,
        request: &PurchaseRequest,
    ) -> LedgerResult<SubmitReceipt>;
}
