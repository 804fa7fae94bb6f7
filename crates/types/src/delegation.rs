//! Delegation records and delegator state.

use crate::{time_bytes, Address, Amount, Asset, DelegationId, Hash, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

impl DelegationId {
    /// Derive the id of a delegation.
    ///
    /// Two delegations from the same delegator to the same validator at the
    /// same instant collide by construction.
    pub fn derive(validator: ValidatorId, delegator: &Address, created_at: Duration) -> Self {
        Self(Hash::from_parts(&[
            b"delegation",
            &validator.0.to_le_bytes(),
            delegator.as_bytes(),
            &time_bytes(created_at),
        ]))
    }
}

/// Lifecycle position of a delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationStatus {
    /// Principal is staked with the validator.
    Active,
    /// Refund accounted for, waiting out the timelock.
    RefundInitiated,
    /// Refund paid out.
    Refunded,
}

/// A single delegation from a delegator to a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// Derived id.
    pub id: DelegationId,
    /// Validator delegated to.
    pub validator: ValidatorId,
    /// Delegator account.
    pub delegator: Address,
    /// Delegated asset.
    pub asset: Asset,
    /// Principal amount.
    pub principal: Amount,
    /// Creation time.
    pub created_at: Duration,
    /// Whether the principal is still staked.
    pub active: bool,
    /// Time the refund was initiated.
    pub refund_initiated_at: Option<Duration>,
    /// Slash-adjusted amount frozen at refund initiation.
    pub refundable: Amount,
    /// Whether the refund has been paid out.
    pub refunded: bool,
}

impl DelegationRecord {
    /// Create a new active delegation.
    pub fn new(
        validator: ValidatorId,
        delegator: Address,
        asset: Asset,
        principal: Amount,
        created_at: Duration,
    ) -> Self {
        Self {
            id: DelegationId::derive(validator, &delegator, created_at),
            validator,
            delegator,
            asset,
            principal,
            created_at,
            active: true,
            refund_initiated_at: None,
            refundable: 0,
            refunded: false,
        }
    }

    /// Current lifecycle position.
    pub fn status(&self) -> DelegationStatus {
        if self.refunded {
            DelegationStatus::Refunded
        } else if self.refund_initiated_at.is_some() {
            DelegationStatus::RefundInitiated
        } else {
            DelegationStatus::Active
        }
    }
}

/// Per-delegator index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorState {
    /// The single validator this delegator currently delegates to.
    pub current_validator: Option<ValidatorId>,
    /// Delegation ids per asset.
    pub delegations: BTreeMap<Asset, BTreeSet<DelegationId>>,
}

impl DelegatorState {
    /// Assets this delegator has delegated.
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.delegations.keys()
    }

    /// All delegation ids, across assets.
    pub fn all_delegations(&self) -> impl Iterator<Item = &DelegationId> {
        self.delegations.values().flatten()
    }
}
