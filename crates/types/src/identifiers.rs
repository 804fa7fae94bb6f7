//! Domain-specific identifier types.

use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Ledger ("chain") identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub u64);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Domain({})", self.0)
    }
}

/// Validator identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorId(pub u64);

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({})", self.0)
    }
}

/// Service (AVS) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service({})", self.0)
    }
}

/// Account address (20 bytes).
///
/// Used for delegators, reward recipients, service accounts and custody
/// accounts. The protocol treats addresses as opaque.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Size of an address in bytes.
    pub const BYTES: usize = 20;

    /// Derive an address from a seed.
    ///
    /// Takes the first 20 bytes of a Blake3 digest over the seed. Used for
    /// well-known accounts (vaults, managers) and fixtures.
    pub fn from_seed(seed: &[u8]) -> Self {
        let hash = Hash::from_bytes(seed);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Canonical byte encoding of a timestamp for id derivation.
pub fn time_bytes(time: Duration) -> [u8; 16] {
    time.as_nanos().to_le_bytes()
}

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Hash);

        impl $name {
            /// Get the underlying hash.
            pub fn hash(&self) -> Hash {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", $label, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..)", $label, &self.0.to_hex()[..12])
            }
        }
    };
}

hash_id!(
    /// Delegation identifier, derived from (validator, delegator, creation time).
    DelegationId,
    "Delegation"
);

hash_id!(
    /// Slash identifier, derived from (validator, service, timestamp).
    SlashId,
    "Slash"
);

hash_id!(
    /// Rewards distribution identifier, derived from (validator, asset, amount, time).
    DistributionId,
    "Distribution"
);

hash_id!(
    /// Correlation id for a cross-domain operation.
    ///
    /// Derived from the operation kind and the (validator, service, asset)
    /// triple, so at most one operation of each kind can be in flight per
    /// triple and a replayed message always maps to the same entry.
    CorrelationId,
    "Correlation"
);
