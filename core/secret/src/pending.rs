//! Plaintext held in memory between decryption and display.

use chrono::{DateTime, Utc};
use std::fmt;

use passdeck_common::{EntryPath, SecretValue};

/// Where a pending secret came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretOrigin {
    /// Produced by the password generator.
    Generated,
    /// Decrypted from a store entry.
    Entry(EntryPath),
}

impl fmt::Display for SecretOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretOrigin::Generated => write!(f, "generated"),
            SecretOrigin::Entry(path) => write!(f, "{}", path),
        }
    }
}

/// A decrypted or generated secret awaiting use.
///
/// The plaintext is zeroized on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct PendingSecret {
    value: SecretValue,
    origin: SecretOrigin,
    created_at: DateTime<Utc>,
}

impl PendingSecret {
    /// Wrap a secret with its origin, stamped now.
    pub fn new(value: SecretValue, origin: SecretOrigin) -> Self {
        Self {
            value,
            origin,
            created_at: Utc::now(),
        }
    }

    /// Secret decrypted from `path`.
    pub fn from_entry(path: EntryPath, value: SecretValue) -> Self {
        Self::new(value, SecretOrigin::Entry(path))
    }

    /// Secret produced by the generator.
    pub fn generated(value: SecretValue) -> Self {
        Self::new(value, SecretOrigin::Generated)
    }

    pub fn value(&self) -> &SecretValue {
        &self.value
    }

    pub fn origin(&self) -> &SecretOrigin {
        &self.origin
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Take the plaintext out.
    pub fn into_value(self) -> SecretValue {
        self.value
    }
}

impl fmt::Debug for PendingSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSecret")
            .field("value", &self.value)
            .field("origin", &self.origin)
            .field("created_at", &self.created_at)
            .finish()
    }
}
