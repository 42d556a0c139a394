//! Operator identity.

use std::fmt;

/// Signing secret of the operator account.
///
/// Not `Serialize`, and `Debug`/`Display` never print the value. Only this
/// crate can read it back.
#[derive(Clone)]
pub struct OperatorCredential(String);

impl OperatorCredential {
    pub fn new(seed: impl Into<String>) -> Self {
        Self(seed.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OperatorCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OperatorCredential([redacted])")
    }
}

impl fmt::Display for OperatorCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// The account that performs mirrored actions.
#[derive(Debug, Clone)]
pub struct OperatorAccount {
    pub address: String,
    credential: OperatorCredential,
}

impl OperatorAccount {
    pub fn new(address: impl Into<String>, credential: OperatorCredential) -> Self {
        Self {
            address: address.into(),
            credential,
        }
    }

    pub(crate) fn credential(&self) -> &OperatorCredential {
        &self.credential
    }
}
