//! Reward claim routed to the domain holding the balance.

use crate::NetworkMessage;
use serde::{Deserialize, Serialize};
use xstake_types::{Address, Amount, Asset, Bips, DistributionId, ValidatorId};

/// Claim a validator's rewards on the domain where they accrued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRewardRequest {
    pub validator: ValidatorId,
    pub recipient: Address,
    pub delegator_share: Bips,
    pub assets: Vec<Asset>,
    /// Origin-assigned claim number; each is paid out at most once.
    pub nonce: u64,
}

impl NetworkMessage for ClaimRewardRequest {
    fn message_type_id() -> &'static str {
        "rewards.claim"
    }
}

/// Outcome of a remote claim, for the origin's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRewardConfirmed {
    pub validator: ValidatorId,
    pub recipient: Address,
    /// Amount paid to the recipient per asset.
    pub paid: Vec<(Asset, Amount)>,
    /// Distributions opened for delegators.
    pub distributions: Vec<DistributionId>,
}

impl NetworkMessage for ClaimRewardConfirmed {
    fn message_type_id() -> &'static str {
        "rewards.claim_confirmed"
    }
}
