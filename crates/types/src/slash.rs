//! Slash records and service slash policies.

use crate::{time_bytes, Amount, Asset, Bips, BipsRange, Hash, ServiceId, SlashId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

impl SlashId {
    /// Derive the id of a slash.
    pub fn derive(validator: ValidatorId, service: ServiceId, timestamp: Duration) -> Self {
        Self(Hash::from_parts(&[
            b"slash",
            &validator.0.to_le_bytes(),
            &service.0.to_le_bytes(),
            &time_bytes(timestamp),
        ]))
    }
}

/// Severity tier of an offence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Soft,
    Hard,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Soft => write!(f, "soft"),
            Severity::Hard => write!(f, "hard"),
        }
    }
}

/// A service's configured penalty bounds per severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashPolicy {
    /// Bounds for soft offences.
    pub soft: BipsRange,
    /// Bounds for hard offences.
    pub hard: BipsRange,
}

impl SlashPolicy {
    /// Bounds for a tier.
    pub fn bounds(&self, severity: Severity) -> BipsRange {
        match severity {
            Severity::Soft => self.soft,
            Severity::Hard => self.hard,
        }
    }

    /// Both ranges ordered, and every soft penalty at most the mildest hard one.
    pub fn is_valid(&self) -> bool {
        self.soft.is_ordered() && self.hard.is_ordered() && self.soft.max <= self.hard.min
    }
}

impl Default for SlashPolicy {
    fn default() -> Self {
        Self {
            soft: BipsRange::new(Bips::ZERO, Bips::saturating(500)),
            hard: BipsRange::new(Bips::saturating(500), Bips::MAX),
        }
    }
}

/// An immutable penalty event against a validator's stake in one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashRecord {
    /// Derived id.
    pub id: SlashId,
    /// Penalised validator.
    pub validator: ValidatorId,
    /// Service that issued the penalty.
    pub service: ServiceId,
    /// Slashed asset.
    pub asset: Asset,
    /// Penalty in basis points of total stake.
    pub bips: Bips,
    /// Penalty amount computed at the issuing service.
    pub amount: Amount,
    /// Time the penalty was issued.
    pub timestamp: Duration,
    /// Free-form reason supplied by the service.
    pub reason: String,
}
