//! Rewards distributions and delegator shares.

use crate::{
    delegator_share_leaf, time_bytes, Address, Amount, Asset, Bips, DistributionId, Hash,
    ValidatorId,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

impl DistributionId {
    /// Derive the id of a distribution.
    pub fn derive(
        validator: ValidatorId,
        asset: &Asset,
        amount: Amount,
        created_at: Duration,
    ) -> Self {
        Self(Hash::from_parts(&[
            b"distribution",
            &validator.0.to_le_bytes(),
            &asset.id_bytes(),
            &amount.to_le_bytes(),
            &time_bytes(created_at),
        ]))
    }
}

/// A pot of rewards reserved for a validator's delegators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsDistribution {
    /// Derived id.
    pub id: DistributionId,
    /// Validator whose delegators share the pot.
    pub validator: ValidatorId,
    /// Asset of the pot.
    pub asset: Asset,
    /// Total amount reserved for delegators.
    pub total: Amount,
    /// Creation time.
    pub created_at: Duration,
    /// Commitment root over the allocation, set once.
    pub commitment_root: Option<Hash>,
}

impl RewardsDistribution {
    /// Open a distribution with no commitment root.
    pub fn open(validator: ValidatorId, asset: Asset, total: Amount, created_at: Duration) -> Self {
        Self {
            id: DistributionId::derive(validator, &asset, total, created_at),
            validator,
            asset,
            total,
            created_at,
            commitment_root: None,
        }
    }
}

/// A delegator's allocation within a distribution (a commitment leaf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorShare {
    /// Delegator receiving the payout.
    pub delegator: Address,
    /// Share of the distribution total.
    pub share: Bips,
}

impl DelegatorShare {
    /// Create a share.
    pub fn new(delegator: Address, share: Bips) -> Self {
        Self { delegator, share }
    }

    /// Commitment leaf for this share.
    pub fn leaf_hash(&self) -> Hash {
        delegator_share_leaf(&self.delegator, self.share)
    }

    /// Payout against a distribution total.
    pub fn payout(&self, total: Amount) -> Amount {
        self.share.apply(total)
    }
}
