//! Raw ledger message classification.
//!
//! Accepts both payload shapes the node may push for a transaction:
//! the body under `transaction` (API v1) or under `tx_json` (API v2).
//! Only validated, successful transactions are ever classified as
//! [`ClassifiedEvent::TrustLineSet`].

use crate::{CurrencyKey, MalformedEventError};
use ledger_relay::RawEvent;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

/// The account whose trust lines are mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedAccount(String);

impl WatchedAccount {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn address(&self) -> &str {
        &self.0
    }
}

/// A trust line set by the watched account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustLineSetEvent {
    pub source_account: String,
    pub key: CurrencyKey,
    pub requested_limit: Decimal,
    pub tx_hash: Option<String>,
}

/// Why a well-formed message is not actionable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    /// Not a transaction or ledger message (responses, peer status, ...)
    UnrecognizedMessage(Option<String>),
    /// Transaction message without a `TransactionType`
    NoTransactionType,
    /// Proposed but not yet in a validated ledger
    NotValidated,
    /// Applied with a non-success engine result
    Failed(String),
    /// Sent by an account other than the watched one
    OtherAccount(String),
    OtherTransactionType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    TrustLineSet(TrustLineSetEvent),
    /// Ledger close or server status. Proves liveness only.
    Heartbeat,
    Unknown(UnknownReason),
}

/// Classify one raw message from the subscription stream.
pub fn classify(
    raw: &RawEvent,
    watched: &WatchedAccount,
) -> Result<ClassifiedEvent, MalformedEventError> {
    let message: Value = serde_json::from_str(&raw.payload)?;
    let message = message
        .as_object()
        .ok_or(MalformedEventError::NotAnObject)?;

    match message.get("type").and_then(Value::as_str) {
        Some("ledgerClosed") | Some("serverStatus") => Ok(ClassifiedEvent::Heartbeat),
        Some("transaction") => classify_transaction(message, watched),
        other => Ok(ClassifiedEvent::Unknown(UnknownReason::UnrecognizedMessage(
            other.map(str::to_string),
        ))),
    }
}

fn classify_transaction(
    message: &Map<String, Value>,
    watched: &WatchedAccount,
) -> Result<ClassifiedEvent, MalformedEventError> {
    let Some(tx) = message
        .get("transaction")
        .or_else(|| message.get("tx_json"))
        .and_then(Value::as_object)
    else {
        return Ok(unknown(UnknownReason::NoTransactionType));
    };

    let Some(tx_type) = tx.get("TransactionType").and_then(Value::as_str) else {
        return Ok(unknown(UnknownReason::NoTransactionType));
    };

    if message.get("validated").and_then(Value::as_bool) == Some(false) {
        return Ok(unknown(UnknownReason::NotValidated));
    }

    if let Some(result) = message.get("engine_result").and_then(Value::as_str) {
        if result != "tesSUCCESS" {
            return Ok(unknown(UnknownReason::Failed(result.to_string())));
        }
    }

    if tx_type != "TrustSet" {
        return Ok(unknown(UnknownReason::OtherTransactionType(
            tx_type.to_string(),
        )));
    }

    let account = tx
        .get("Account")
        .and_then(Value::as_str)
        .ok_or(MalformedEventError::MissingField("Account"))?;
    if account != watched.address() {
        return Ok(unknown(UnknownReason::OtherAccount(account.to_string())));
    }

    let limit = tx
        .get("LimitAmount")
        .and_then(Value::as_object)
        .ok_or(MalformedEventError::MissingField("LimitAmount"))?;
    let currency = required_str(limit, "currency", "LimitAmount.currency")?;
    let issuer = required_str(limit, "issuer", "LimitAmount.issuer")?;
    let value = required_str(limit, "value", "LimitAmount.value")?;

    let requested_limit =
        parse_limit(value).ok_or_else(|| MalformedEventError::InvalidLimit(value.to_string()))?;

    let tx_hash = tx
        .get("hash")
        .or_else(|| message.get("hash"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ClassifiedEvent::TrustLineSet(TrustLineSetEvent {
        source_account: account.to_string(),
        key: CurrencyKey::new(currency, issuer),
        requested_limit,
        tx_hash,
    }))
}

fn unknown(reason: UnknownReason) -> ClassifiedEvent {
    ClassifiedEvent::Unknown(reason)
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<&'a str, MalformedEventError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(MalformedEventError::MissingField(field))
}

/// Parse a ledger amount string into a non-negative decimal.
///
/// Ledger values may use scientific notation and exceed the decimal range;
/// out-of-range magnitudes saturate (large to `Decimal::MAX`, tiny to zero).
fn parse_limit(value: &str) -> Option<Decimal> {
    let value = value.trim();
    let parsed = Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
        .or_else(|| {
            let approx: f64 = value.parse().ok()?;
            if !approx.is_finite() {
                return None;
            }
            Some(if approx >= 1.0 {
                Decimal::MAX
            } else if approx <= -1.0 {
                Decimal::MIN
            } else {
                Decimal::ZERO
            })
        })?;

    if parsed.is_sign_negative() && !parsed.is_zero() {
        return None;
    }
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const WATCHED: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
    const ISSUER: &str = "rXYZissuerXXXXXXXXXXXXXXXXXXXXXXX";

    fn watched() -> WatchedAccount {
        WatchedAccount::new(WATCHED)
    }

    fn raw(value: Value) -> RawEvent {
        RawEvent::new(value.to_string())
    }

    fn trust_set(account: &str, value: &str) -> Value {
        json!({
            "type": "transaction",
            "validated": true,
            "engine_result": "tesSUCCESS",
            "transaction": {
                "TransactionType": "TrustSet",
                "Account": account,
                "LimitAmount": {"currency": "FOO", "issuer": ISSUER, "value": value},
                "hash": "E3FE6EA3D48F0C2B639448020EA4F03D4F4F8FFDB243A852A0F59177921B4879"
            }
        })
    }

    #[test]
    fn test_watched_trust_set() {
        let event = classify(&raw(trust_set(WATCHED, "500")), &watched()).unwrap();

        let ClassifiedEvent::TrustLineSet(event) = event else {
            panic!("expected TrustLineSet, got {:?}", event);
        };
        assert_eq!(event.source_account, WATCHED);
        assert_eq!(event.key, CurrencyKey::new("FOO", ISSUER));
        assert_eq!(event.requested_limit, dec!(500));
        assert!(event.tx_hash.unwrap().starts_with("E3FE6EA3"));
    }

    #[test]
    fn test_tx_json_payload_shape() {
        let message = json!({
            "type": "transaction",
            "validated": true,
            "hash": "ABCDEF",
            "tx_json": {
                "TransactionType": "TrustSet",
                "Account": WATCHED,
                "LimitAmount": {"currency": "BAR", "issuer": ISSUER, "value": "42.5"}
            }
        });

        let ClassifiedEvent::TrustLineSet(event) = classify(&raw(message), &watched()).unwrap()
        else {
            panic!("expected TrustLineSet");
        };
        assert_eq!(event.requested_limit, dec!(42.5));
        assert_eq!(event.tx_hash.as_deref(), Some("ABCDEF"));
    }

    #[test]
    fn test_other_account_is_unknown() {
        let other = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
        let event = classify(&raw(trust_set(other, "500")), &watched()).unwrap();
        assert_eq!(
            event,
            ClassifiedEvent::Unknown(UnknownReason::OtherAccount(other.to_string()))
        );
    }

    #[test]
    fn test_heartbeats() {
        for kind in ["ledgerClosed", "serverStatus"] {
            let event = classify(&raw(json!({"type": kind, "ledger_index": 9})), &watched());
            assert_eq!(event.unwrap(), ClassifiedEvent::Heartbeat);
        }
    }

    #[test]
    fn test_missing_transaction_type_is_unknown() {
        let message = json!({"type": "transaction", "transaction": {"Account": WATCHED}});
        assert_eq!(
            classify(&raw(message), &watched()).unwrap(),
            ClassifiedEvent::Unknown(UnknownReason::NoTransactionType)
        );
    }

    #[test]
    fn test_unvalidated_and_failed_are_unknown() {
        let mut proposed = trust_set(WATCHED, "500");
        proposed["validated"] = json!(false);
        assert_eq!(
            classify(&raw(proposed), &watched()).unwrap(),
            ClassifiedEvent::Unknown(UnknownReason::NotValidated)
        );

        let mut failed = trust_set(WATCHED, "500");
        failed["engine_result"] = json!("tecNO_LINE_INSUF_RESERVE");
        assert!(matches!(
            classify(&raw(failed), &watched()).unwrap(),
            ClassifiedEvent::Unknown(UnknownReason::Failed(_))
        ));
    }

    #[test]
    fn test_other_transaction_types() {
        let message = json!({
            "type": "transaction",
            "validated": true,
            "transaction": {"TransactionType": "Payment", "Account": WATCHED}
        });
        assert_eq!(
            classify(&raw(message), &watched()).unwrap(),
            ClassifiedEvent::Unknown(UnknownReason::OtherTransactionType("Payment".to_string()))
        );
    }

    #[test]
    fn test_responses_are_unknown() {
        let message = json!({"type": "response", "status": "success", "result": {}});
        assert!(matches!(
            classify(&raw(message), &watched()).unwrap(),
            ClassifiedEvent::Unknown(UnknownReason::UnrecognizedMessage(Some(_)))
        ));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            classify(&RawEvent::new("{not json"), &watched()),
            Err(MalformedEventError::InvalidJson(_))
        ));
        assert!(matches!(
            classify(&RawEvent::new("[1,2]"), &watched()),
            Err(MalformedEventError::NotAnObject)
        ));

        let mut no_issuer = trust_set(WATCHED, "500");
        no_issuer["transaction"]["LimitAmount"]
            .as_object_mut()
            .unwrap()
            .remove("issuer");
        assert!(matches!(
            classify(&raw(no_issuer), &watched()),
            Err(MalformedEventError::MissingField("LimitAmount.issuer"))
        ));

        assert!(matches!(
            classify(&raw(trust_set(WATCHED, "lots")), &watched()),
            Err(MalformedEventError::InvalidLimit(_))
        ));
        assert!(matches!(
            classify(&raw(trust_set(WATCHED, "-5")), &watched()),
            Err(MalformedEventError::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_parse_limit_notation() {
        assert_eq!(parse_limit("1000"), Some(dec!(1000)));
        assert_eq!(parse_limit("0.5"), Some(dec!(0.5)));
        assert_eq!(parse_limit("1e3"), Some(dec!(1000)));
        assert_eq!(parse_limit("9999999999999999e80"), Some(Decimal::MAX));
        assert_eq!(parse_limit("1e-90"), Some(Decimal::ZERO));
        assert_eq!(parse_limit("0"), Some(Decimal::ZERO));
        assert_eq!(parse_limit("NaN"), None);
    }
}
