//! Validator records and stake positions.

use crate::{Address, Amount, Asset, DomainId, ServiceId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Externally attested stake (e.g. beacon-chain balance) for a native position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestedStake {
    /// Attested balance.
    pub amount: Amount,
    /// Time the attestation refers to.
    pub as_of: Duration,
    /// Cleared once slashing drains the attested balance.
    pub active: bool,
}

/// A validator's stake in one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Stake held directly in the validator's custody account
    /// (self-bond plus delegated principal).
    pub direct: Amount,
    /// Externally attested stake, native asset only.
    pub attested: Option<AttestedStake>,
}

impl StakePosition {
    /// Total stake counted for slashing and eligibility.
    pub fn total(&self) -> Amount {
        let attested = self
            .attested
            .filter(|a| a.active)
            .map(|a| a.amount)
            .unwrap_or(0);
        self.direct.saturating_add(attested)
    }

    /// Whether this position actively stakes the asset.
    pub fn is_active(&self) -> bool {
        self.total() > 0
    }

    /// Apply a penalty: consume direct stake first, then spill into the
    /// attested balance. An attested balance driven to zero is deactivated.
    pub fn apply_penalty(&mut self, amount: Amount) -> PenaltySplit {
        let from_direct = amount.min(self.direct);
        self.direct -= from_direct;

        let mut from_attested = 0;
        let mut attested_deactivated = false;
        let remainder = amount - from_direct;

        if let Some(attested) = self.attested.as_mut().filter(|a| a.active) {
            if remainder > 0 {
                from_attested = remainder.min(attested.amount);
                attested.amount -= from_attested;
                if attested.amount == 0 {
                    attested.active = false;
                    attested_deactivated = true;
                }
            }
        }

        PenaltySplit {
            from_direct,
            from_attested,
            attested_deactivated,
        }
    }
}

/// How a penalty was absorbed by a stake position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltySplit {
    /// Amount taken from directly held stake.
    pub from_direct: Amount,
    /// Amount taken from the attested balance.
    pub from_attested: Amount,
    /// Whether the attested position was marked inactive.
    pub attested_deactivated: bool,
}

impl PenaltySplit {
    /// Total amount absorbed.
    pub fn total(&self) -> Amount {
        self.from_direct + self.from_attested
    }
}

/// Descriptive record of a validator as known to one domain.
///
/// Validators registered on a domain have `origin == local domain`. A service
/// domain also keeps a mirror of every remote validator enrolled with one of
/// its services; the mirror carries the stake snapshot from the enrollment
/// and the reward balances accrued on that domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    /// Validator identity.
    pub id: ValidatorId,
    /// Domain where the validator's custody account lives.
    pub origin: DomainId,
    /// Custody account holding directly staked assets.
    pub custody: Address,
    /// Operator account allowed to act on behalf of the validator.
    pub operator: Address,
    /// Stake per asset.
    pub stakes: BTreeMap<Asset, StakePosition>,
    /// Services the validator is enrolled with, per asset.
    pub enrollments: BTreeMap<Asset, BTreeSet<ServiceId>>,
    /// Accrued reward balance per asset.
    pub rewards: BTreeMap<Asset, Amount>,
    /// Cumulative slashed amount per service.
    pub slashed: BTreeMap<ServiceId, Amount>,
}

impl ValidatorRecord {
    /// Create an empty record.
    pub fn new(id: ValidatorId, origin: DomainId, custody: Address, operator: Address) -> Self {
        Self {
            id,
            origin,
            custody,
            operator,
            stakes: BTreeMap::new(),
            enrollments: BTreeMap::new(),
            rewards: BTreeMap::new(),
            slashed: BTreeMap::new(),
        }
    }

    /// Total stake in an asset.
    pub fn total_stake(&self, asset: &Asset) -> Amount {
        self.stakes.get(asset).map(|p| p.total()).unwrap_or(0)
    }

    /// Whether the validator actively stakes an asset.
    pub fn is_staking(&self, asset: &Asset) -> bool {
        self.stakes.get(asset).is_some_and(|p| p.is_active())
    }

    /// Assets with at least one enrollment.
    pub fn enrolled_assets(&self) -> impl Iterator<Item = &Asset> {
        self.enrollments.keys()
    }

    /// Whether the validator is enrolled with `service` for `asset`.
    pub fn is_enrolled(&self, service: ServiceId, asset: &Asset) -> bool {
        self.enrollments
            .get(asset)
            .is_some_and(|services| services.contains(&service))
    }

    /// Whether the validator is enrolled with `service` for any asset.
    pub fn is_enrolled_with(&self, service: ServiceId) -> bool {
        self.enrollments.values().any(|s| s.contains(&service))
    }

    /// Add an enrollment. Returns false if it already existed.
    pub fn add_enrollment(&mut self, service: ServiceId, asset: Asset) -> bool {
        self.enrollments.entry(asset).or_default().insert(service)
    }

    /// Remove an enrollment, dropping the asset once its last service is gone.
    /// Returns false if the enrollment did not exist.
    pub fn remove_enrollment(&mut self, service: ServiceId, asset: &Asset) -> bool {
        let Some(services) = self.enrollments.get_mut(asset) else {
            return false;
        };
        let removed = services.remove(&service);
        if services.is_empty() {
            self.enrollments.remove(asset);
        }
        removed
    }

    /// Snapshot of this validator for an enrollment payload.
    pub fn descriptor(&self, asset: Asset) -> ValidatorDescriptor {
        ValidatorDescriptor {
            id: self.id,
            origin: self.origin,
            custody: self.custody,
            operator: self.operator,
            asset,
            stake: self.total_stake(&asset),
        }
    }
}

/// Validator snapshot carried by an enrollment message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    /// Validator identity.
    pub id: ValidatorId,
    /// Origin domain (the "chain" of the eligibility table).
    pub origin: DomainId,
    /// Custody account on the origin domain.
    pub custody: Address,
    /// Operator account.
    pub operator: Address,
    /// Asset being enrolled.
    pub asset: Asset,
    /// Total stake in `asset` at enrollment time.
    pub stake: Amount,
}
