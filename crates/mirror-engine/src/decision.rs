//! Reaction policy.
//!
//! [`decide`] is pure: given the same event, dedup state and policy it
//! always yields the same decision.

use crate::{ClassifiedEvent, CurrencyKey, DedupState};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionPolicy {
    pub min_trust_line_amount: Decimal,
    pub max_trust_line_amount: Decimal,
    /// Decide but never act.
    pub watch_only: bool,
}

/// Establish the operator's own trust line for `key` at `limit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTrustLine {
    pub key: CurrencyKey,
    pub requested_limit: Decimal,
    pub limit: Decimal,
    pub source_tx: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoActionReason {
    NotTrustLine,
    AlreadyMirrored,
    WatchOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionDecision {
    Mirror(MirrorTrustLine),
    /// `key` is the currency the event named, absent for non trust-line events.
    NoAction {
        key: Option<CurrencyKey>,
        reason: NoActionReason,
    },
}

impl ReactionDecision {
    fn skip(key: &CurrencyKey, reason: NoActionReason) -> Self {
        ReactionDecision::NoAction {
            key: Some(key.clone()),
            reason,
        }
    }
}

/// `max(min(requested, max), min)`. The floor wins if the bounds cross.
pub fn clamp_limit(requested: Decimal, min: Decimal, max: Decimal) -> Decimal {
    requested.min(max).max(min)
}

pub fn decide(
    event: &ClassifiedEvent,
    dedup: &DedupState,
    policy: &ReactionPolicy,
) -> ReactionDecision {
    let ClassifiedEvent::TrustLineSet(event) = event else {
        return ReactionDecision::NoAction {
            key: None,
            reason: NoActionReason::NotTrustLine,
        };
    };

    if dedup.contains(&event.key) {
        return ReactionDecision::skip(&event.key, NoActionReason::AlreadyMirrored);
    }
    if policy.watch_only {
        return ReactionDecision::skip(&event.key, NoActionReason::WatchOnly);
    }

    ReactionDecision::Mirror(MirrorTrustLine {
        key: event.key.clone(),
        requested_limit: event.requested_limit,
        limit: clamp_limit(
            event.requested_limit,
            policy.min_trust_line_amount,
            policy.max_trust_line_amount,
        ),
        source_tx: event.tx_hash.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TrustLineSetEvent, UnknownReason};
    use rust_decimal_macros::dec;

    fn policy() -> ReactionPolicy {
        ReactionPolicy {
            min_trust_line_amount: dec!(1000),
            max_trust_line_amount: dec!(10000),
            watch_only: false,
        }
    }

    fn trust_line(limit: Decimal) -> ClassifiedEvent {
        ClassifiedEvent::TrustLineSet(TrustLineSetEvent {
            source_account: "rWatched".to_string(),
            key: CurrencyKey::new("FOO", "rXYZ"),
            requested_limit: limit,
            tx_hash: Some("AB12".to_string()),
        })
    }

    fn mirrored_limit(decision: ReactionDecision) -> Decimal {
        match decision {
            ReactionDecision::Mirror(action) => action.limit,
            other => panic!("expected Mirror, got {:?}", other),
        }
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(dec!(500), dec!(1000), dec!(10000)), dec!(1000));
        assert_eq!(clamp_limit(dec!(50000), dec!(1000), dec!(10000)), dec!(10000));
        assert_eq!(clamp_limit(dec!(2500.5), dec!(1000), dec!(10000)), dec!(2500.5));
        assert_eq!(clamp_limit(dec!(5), dec!(100), dec!(10)), dec!(100));
    }

    #[test]
    fn test_mirror_decision_clamps() {
        let dedup = DedupState::new();
        assert_eq!(mirrored_limit(decide(&trust_line(dec!(500)), &dedup, &policy())), dec!(1000));
        assert_eq!(mirrored_limit(decide(&trust_line(dec!(50000)), &dedup, &policy())), dec!(10000));
        assert_eq!(mirrored_limit(decide(&trust_line(Decimal::MAX), &dedup, &policy())), dec!(10000));
    }

    #[test]
    fn test_mirror_carries_source() {
        let ReactionDecision::Mirror(action) =
            decide(&trust_line(dec!(3000)), &DedupState::new(), &policy())
        else {
            panic!("expected Mirror");
        };
        assert_eq!(action.key, CurrencyKey::new("FOO", "rXYZ"));
        assert_eq!(action.requested_limit, dec!(3000));
        assert_eq!(action.source_tx.as_deref(), Some("AB12"));
    }

    #[test]
    fn test_already_mirrored() {
        let mut dedup = DedupState::new();
        dedup.insert(CurrencyKey::new("FOO", "rXYZ"));
        assert_eq!(
            decide(&trust_line(dec!(500)), &dedup, &policy()),
            ReactionDecision::NoAction {
                key: Some(CurrencyKey::new("FOO", "rXYZ")),
                reason: NoActionReason::AlreadyMirrored,
            }
        );
    }

    #[test]
    fn test_non_trust_line_events() {
        let dedup = DedupState::new();
        for event in [
            ClassifiedEvent::Heartbeat,
            ClassifiedEvent::Unknown(UnknownReason::NoTransactionType),
        ] {
            assert_eq!(
                decide(&event, &dedup, &policy()),
                ReactionDecision::NoAction {
                    key: None,
                    reason: NoActionReason::NotTrustLine,
                }
            );
        }
    }

    #[test]
    fn test_watch_only() {
        let policy = ReactionPolicy {
            watch_only: true,
            ..policy()
        };
        assert_eq!(
            decide(&trust_line(dec!(500)), &DedupState::new(), &policy),
            ReactionDecision::NoAction {
                key: Some(CurrencyKey::new("FOO", "rXYZ")),
                reason: NoActionReason::WatchOnly,
            }
        );
    }
}
