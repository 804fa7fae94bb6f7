//! Core types for the xstake validator coordination protocol.
//!
//! Records in this crate are plain data. Each one is owned by exactly one
//! component (see the component crates) and referenced elsewhere by its
//! stable identifier.

mod asset;
mod delegation;
mod distribution;
mod hash;
mod identifiers;
mod merkle;
mod pending;
mod slash;
mod validator;

pub use asset::{Amount, Asset, Bips, BipsError, BipsRange};
pub use delegation::{DelegationRecord, DelegationStatus, DelegatorState};
pub use distribution::{DelegatorShare, RewardsDistribution};
pub use hash::{Hash, HexError};
pub use identifiers::{
    time_bytes, Address, CorrelationId, DelegationId, DistributionId, DomainId, ServiceId, SlashId,
    ValidatorId,
};
pub use merkle::{build_merkle_tree_with_proofs, delegator_share_leaf, MerkleProof};
pub use pending::{OperationKind, PendingOperation, PendingPhase};
pub use slash::{Severity, SlashPolicy, SlashRecord};
pub use validator::{AttestedStake, PenaltySplit, StakePosition, ValidatorDescriptor, ValidatorRecord};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
