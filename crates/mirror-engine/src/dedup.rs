//! Per-currency dedup state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identity of a mirrorable trust line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyKey {
    pub currency: String,
    pub issuer: String,
}

impl CurrencyKey {
    pub fn new(currency: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            issuer: issuer.into(),
        }
    }
}

impl fmt::Display for CurrencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.currency, self.issuer)
    }
}

/// Currency keys already mirrored in this process.
///
/// Entries are added only after a successful trust line and never removed.
#[derive(Debug, Clone, Default)]
pub struct DedupState {
    mirrored: HashSet<CurrencyKey>,
}

impl DedupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CurrencyKey) -> bool {
        self.mirrored.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: CurrencyKey) -> bool {
        self.mirrored.insert(key)
    }

    pub fn len(&self) -> usize {
        self.mirrored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrored.is_empty()
    }
}
