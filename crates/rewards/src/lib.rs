//! Rewards distributor.
//!
//! Services pay rewards into a vault and credit them to validators. A
//! validator's operator claims its balance with a delegator share: the
//! validator's portion is paid out immediately and the delegators' portion
//! is reserved in a [`RewardsDistribution`]. An off-ledger process computes
//! each delegator's share, commits to the allocation with a Merkle root,
//! and delegators claim individually with inclusion proofs.
//!
//! [`RewardsDistribution`]: xstake_types::RewardsDistribution

mod commitment;
mod distributor;

pub use commitment::{build_commitment, Commitment};
pub use distributor::RewardsDistributor;
