//! Transaction JSON builders and metadata helpers.

use crate::{LedgerError, LedgerResult, PurchaseRequest, TrustSetRequest};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

/// Allow the payment to deliver less than `Amount` (down to `DeliverMin`).
pub const TF_PARTIAL_PAYMENT: u32 = 0x0002_0000;

const DROPS_PER_XRP: i64 = 1_000_000;

/// XRP to integer drops, truncating sub-drop precision.
pub fn xrp_to_drops(xrp: Decimal) -> LedgerResult<String> {
    let drops = (xrp * Decimal::from(DROPS_PER_XRP)).trunc();
    if drops <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "{} XRP is less than one drop",
            xrp
        )));
    }
    drops
        .to_u64()
        .map(|d| d.to_string())
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{} XRP is out of range", xrp)))
}

/// Integer drops string to XRP.
pub fn drops_to_xrp(drops: &str) -> Option<Decimal> {
    let drops: i64 = drops.parse().ok()?;
    Some(Decimal::from(drops) / Decimal::from(DROPS_PER_XRP))
}

fn issued_amount(currency: &str, issuer: &str, value: Decimal) -> Value {
    json!({
        "currency": currency,
        "issuer": issuer,
        "value": value.normalize().to_string(),
    })
}

/// `TrustSet` from `account` with the requested limit.
pub fn trust_set_tx(account: &str, request: &TrustSetRequest) -> Value {
    json!({
        "TransactionType": "TrustSet",
        "Account": account,
        "LimitAmount": issued_amount(&request.currency, &request.issuer, request.limit),
    })
}

/// Cross-currency `Payment` from `account` to itself.
///
/// Spends at most `send_max_xrp`; delivers at least
/// `amount * (1 - slippage_percent / 100)`.
pub fn purchase_tx(account: &str, request: &PurchaseRequest) -> LedgerResult<Value> {
    if request.amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "purchase amount {} must be positive",
            request.amount
        )));
    }
    let tolerance = Decimal::ONE - request.slippage_percent / Decimal::ONE_HUNDRED;
    let deliver_min = (request.amount * tolerance).max(Decimal::ZERO);

    Ok(json!({
        "TransactionType": "Payment",
        "Account": account,
        "Destination": account,
        "Amount": issued_amount(&request.currency, &request.issuer, request.amount),
        "DeliverMin": issued_amount(&request.currency, &request.issuer, deliver_min),
        "SendMax": xrp_to_drops(request.send_max_xrp)?,
        "Flags": TF_PARTIAL_PAYMENT,
    }))
}

/// Net XRP that left `account` according to a transaction's metadata.
///
/// `None` when the account root is not among the affected nodes.
pub fn xrp_spent_from_meta(meta: &Value, account: &str) -> Option<Decimal> {
    let nodes = meta.get("AffectedNodes")?.as_array()?;
    nodes.iter().find_map(|node| {
        let modified = node.get("ModifiedNode")?;
        if modified.get("LedgerEntryType")?.as_str()? != "AccountRoot" {
            return None;
        }
        let final_fields = modified.get("FinalFields")?;
        if final_fields.get("Account")?.as_str()? != account {
            return None;
        }
        let after = drops_to_xrp(final_fields.get("Balance")?.as_str()?)?;
        let before = modified
            .get("PreviousFields")
            .and_then(|p| p.get("Balance"))
            .and_then(Value::as_str)
            .and_then(drops_to_xrp)
            .unwrap_or(after);
        Some(before - after)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const OPERATOR: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const ISSUER: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";

    #[test]
    fn test_xrp_to_drops() {
        assert_eq!(xrp_to_drops(dec!(85)).unwrap(), "85000000");
        assert_eq!(xrp_to_drops(dec!(0.0000015)).unwrap(), "1");
        assert!(xrp_to_drops(dec!(0)).is_err());
        assert!(xrp_to_drops(dec!(0.0000001)).is_err());
    }

    #[test]
    fn test_drops_to_xrp() {
        assert_eq!(drops_to_xrp("12").unwrap(), dec!(0.000012));
        assert!(drops_to_xrp("12.5").is_none());
    }

    #[test]
    fn test_trust_set_tx_shape() {
        let tx = trust_set_tx(
            OPERATOR,
            &TrustSetRequest {
                currency: "FOO".to_string(),
                issuer: ISSUER.to_string(),
                limit: dec!(1000.00),
            },
        );

        assert_eq!(tx["TransactionType"], "TrustSet");
        assert_eq!(tx["Account"], OPERATOR);
        assert_eq!(tx["LimitAmount"]["currency"], "FOO");
        assert_eq!(tx["LimitAmount"]["issuer"], ISSUER);
        assert_eq!(tx["LimitAmount"]["value"], "1000");
    }

    #[test]
    fn test_purchase_tx_bounds() {
        let tx = purchase_tx(
            OPERATOR,
            &PurchaseRequest {
                currency: "FOO".to_string(),
                issuer: ISSUER.to_string(),
                amount: dec!(1),
                send_max_xrp: dec!(85),
                slippage_percent: dec!(5),
            },
        )
        .unwrap();

        assert_eq!(tx["TransactionType"], "Payment");
        assert_eq!(tx["Destination"], OPERATOR);
        assert_eq!(tx["Amount"]["value"], "1");
        assert_eq!(tx["DeliverMin"]["value"], "0.95");
        assert_eq!(tx["SendMax"], "85000000");
        assert_eq!(tx["Flags"], TF_PARTIAL_PAYMENT);
    }

    #[test]
    fn test_purchase_tx_rejects_non_positive_amount() {
        let request = PurchaseRequest {
            currency: "FOO".to_string(),
            issuer: ISSUER.to_string(),
            amount: dec!(0),
            send_max_xrp: dec!(85),
            slippage_percent: dec!(5),
        };
        assert!(matches!(
            purchase_tx(OPERATOR, &request),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_xrp_spent_from_meta() {
        let meta = json!({
            "AffectedNodes": [
                {"ModifiedNode": {
                    "LedgerEntryType": "RippleState",
                    "FinalFields": {"Balance": {"currency": "FOO", "value": "1"}}
                }},
                {"ModifiedNode": {
                    "LedgerEntryType": "AccountRoot",
                    "FinalFields": {"Account": ISSUER, "Balance": "500000000"},
                    "PreviousFields": {"Balance": "480000000"}
                }},
                {"ModifiedNode": {
                    "LedgerEntryType": "AccountRoot",
                    "FinalFields": {"Account": OPERATOR, "Balance": "79999988"},
                    "PreviousFields": {"Balance": "100000000"}
                }}
            ],
            "TransactionResult": "tesSUCCESS"
        });

        assert_eq!(xrp_spent_from_meta(&meta, OPERATOR), Some(dec!(20.000012)));
        assert_eq!(xrp_spent_from_meta(&meta, "rUnrelated"), None);
    }
}
