//! Assets, amounts and basis points.

use crate::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount.
pub type Amount = u128;

/// Kind of asset held in custody.
///
/// The custody layer dispatches on this tag once at its boundary; the rest of
/// the protocol treats both kinds identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    /// The ledger's native asset. Only native positions can carry
    /// externally attested stake.
    Native,
    /// A token contract identified by its address.
    Token(Address),
}

impl Asset {
    /// Canonical bytes for id derivation.
    pub fn id_bytes(&self) -> [u8; 21] {
        let mut bytes = [0u8; 21];
        if let Asset::Token(address) = self {
            bytes[0] = 1;
            bytes[1..].copy_from_slice(address.as_bytes());
        }
        bytes
    }

    /// Whether this is the native asset.
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(address) => write!(f, "token:{}", address),
        }
    }
}

/// Basis points: 1/100 of a percent, 10000 = 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Bips(u16);

impl Bips {
    /// Denominator for basis point arithmetic.
    pub const DENOMINATOR: u16 = 10_000;

    /// Zero basis points.
    pub const ZERO: Self = Bips(0);

    /// 100%.
    pub const MAX: Self = Bips(Self::DENOMINATOR);

    /// Create from a raw value, rejecting anything above 10000.
    pub fn new(value: u16) -> Result<Self, BipsError> {
        if value > Self::DENOMINATOR {
            return Err(BipsError::OutOfRange(value));
        }
        Ok(Bips(value))
    }

    /// Create from a raw value, clamping anything above 10000.
    pub const fn saturating(value: u16) -> Self {
        if value > Self::DENOMINATOR {
            Bips(Self::DENOMINATOR)
        } else {
            Bips(value)
        }
    }

    /// Get the raw value.
    pub fn get(&self) -> u16 {
        self.0
    }

    /// Whether this is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `amount × bips / 10000`, rounded down.
    pub fn apply(&self, amount: Amount) -> Amount {
        // Split to avoid overflow on very large amounts.
        let denominator = Self::DENOMINATOR as Amount;
        let bips = self.0 as Amount;
        (amount / denominator) * bips + (amount % denominator) * bips / denominator
    }
}

impl TryFrom<u16> for Bips {
    type Error = BipsError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Bips::new(value)
    }
}

impl From<Bips> for u16 {
    fn from(bips: Bips) -> Self {
        bips.0
    }
}

impl fmt::Display for Bips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// Inclusive range of basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BipsRange {
    /// Lower bound (inclusive).
    pub min: Bips,
    /// Upper bound (inclusive).
    pub max: Bips,
}

impl BipsRange {
    /// Create a new range.
    pub fn new(min: Bips, max: Bips) -> Self {
        Self { min, max }
    }

    /// Whether `bips` lies within the range.
    pub fn contains(&self, bips: Bips) -> bool {
        self.min <= bips && bips <= self.max
    }

    /// Whether `min <= max`.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// Errors constructing basis points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BipsError {
    #[error("Basis points out of range: {0} > 10000")]
    OutOfRange(u16),
}
