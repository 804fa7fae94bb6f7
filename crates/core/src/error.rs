//! Error types for the protocol.

use std::time::Duration;
use thiserror::Error;
use xstake_types::{
    Address, Amount, Asset, Bips, CorrelationId, DelegationId, DistributionId, ServiceId, SlashId,
    ValidatorId,
};

/// Errors from the custody collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    /// The account cannot cover the requested amount.
    #[error("Insufficient funds in {account} for {asset}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: Address,
        asset: Asset,
        requested: Amount,
        available: Amount,
    },

    /// A credit would overflow the balance.
    #[error("Balance overflow in {account} for {asset}")]
    Overflow { account: Address, asset: Asset },
}

/// Which branch of the error taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Rejected up front; no state change.
    Validation,
    /// Too early; retry later, no state change.
    Timelock,
    /// An inbound message did not match local state.
    CrossDomain,
    /// The custody collaborator refused a transfer.
    Custody,
}

/// Every way a command or inbound message can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    // ═══════════════════════════════════════════════════════════════════════
    // Directory
    // ═══════════════════════════════════════════════════════════════════════
    #[error("Unknown validator {0}")]
    UnknownValidator(ValidatorId),

    #[error("Validator {0} is already registered")]
    ValidatorAlreadyRegistered(ValidatorId),

    #[error("No custody account for validator {0}")]
    NoValidatorAccount(ValidatorId),

    #[error("Unknown service {0}")]
    UnknownService(ServiceId),

    #[error("Service {0} is already registered")]
    ServiceAlreadyRegistered(ServiceId),

    #[error("Invalid slash policy for service {0}")]
    InvalidSlashPolicy(ServiceId),

    #[error("Attestation for {validator} at {as_of:?} is older than the stored one")]
    StaleAttestation {
        validator: ValidatorId,
        as_of: Duration,
    },

    #[error("Caller {caller} is not authorized")]
    Unauthorized { caller: Address },

    #[error("Caller {caller} is not the operator of {validator}")]
    NotOperator {
        caller: Address,
        validator: ValidatorId,
    },

    #[error("Amount must be nonzero")]
    ZeroAmount,

    // ═══════════════════════════════════════════════════════════════════════
    // Delegation
    // ═══════════════════════════════════════════════════════════════════════
    #[error("Delegation {0} already exists")]
    DuplicateDelegation(DelegationId),

    #[error("Unknown delegation {0}")]
    UnknownDelegation(DelegationId),

    #[error("Validator {validator} is not staking {asset}")]
    AssetNotStaked { validator: ValidatorId, asset: Asset },

    #[error("Delegator already delegates to {current}, cannot delegate to {requested}")]
    MultiValidatorConflict {
        current: ValidatorId,
        requested: ValidatorId,
    },

    #[error("Caller is not the delegator of {0}")]
    NotOwner(DelegationId),

    #[error("Delegation {0} is already refunded")]
    AlreadyRefunded(DelegationId),

    #[error("Refund of delegation {0} is already initiated")]
    AlreadyInitiated(DelegationId),

    #[error("Refund of delegation {0} was never initiated")]
    RefundNotInitiated(DelegationId),

    #[error("Timelock not elapsed: now {now:?}, unlocks at {unlock_at:?}")]
    TimelockNotElapsed { now: Duration, unlock_at: Duration },

    // ═══════════════════════════════════════════════════════════════════════
    // Enrollment & detachment
    // ═══════════════════════════════════════════════════════════════════════
    #[error("Enrollment of {validator} with {service} for {asset} is already pending")]
    EnrollmentAlreadyPending {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
    },

    #[error("{validator} is already enrolled with {service} for {asset}")]
    AlreadyEnrolled {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
    },

    #[error("{validator} is not eligible for {service}")]
    Ineligible {
        validator: ValidatorId,
        service: ServiceId,
    },

    #[error("{validator} is not enrolled with {service} for {asset}")]
    NotEnrolled {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
    },

    #[error("Detachment of {validator} from {service} for {asset} is already pending")]
    DetachAlreadyPending {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
    },

    #[error("No unlock time for detachment {0}")]
    NoUnlockTime(CorrelationId),

    #[error("No pending enrollment for {0}")]
    NoPendingEnrollment(CorrelationId),

    #[error("No pending detachment for {0}")]
    NoPendingDetachment(CorrelationId),

    #[error("Operation {0} is already pending")]
    OperationAlreadyPending(CorrelationId),

    #[error("Too many pending operations (limit {limit})")]
    TooManyPending { limit: usize },

    #[error("Message for {correlation} does not match the pending phase")]
    UnexpectedPhase { correlation: CorrelationId },

    // ═══════════════════════════════════════════════════════════════════════
    // Slashing
    // ═══════════════════════════════════════════════════════════════════════
    #[error("Penalty {bips} outside the service's bounds")]
    PenaltyOutOfBounds { bips: Bips },

    #[error("{validator} is not enrolled with {service} for {asset}")]
    NotEnrolledForAsset {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
    },

    #[error("Slash {0} was already executed")]
    AlreadyExecuted(SlashId),

    // ═══════════════════════════════════════════════════════════════════════
    // Rewards
    // ═══════════════════════════════════════════════════════════════════════
    #[error("Unknown distribution {0}")]
    UnknownDistribution(DistributionId),

    #[error("Distribution {0} already exists")]
    DistributionExists(DistributionId),

    #[error("Commitment root of {0} is already set")]
    RootAlreadySet(DistributionId),

    #[error("Commitment root of {0} is not set")]
    RootNotSet(DistributionId),

    #[error("{delegator} already claimed from {distribution}")]
    AlreadyClaimed {
        distribution: DistributionId,
        delegator: Address,
    },

    #[error("Nothing to claim from {0}")]
    NothingToClaim(DistributionId),

    #[error("Invalid inclusion proof for {0}")]
    InvalidProof(DistributionId),

    #[error("Claim of {requested} exceeds the {remaining} left in {distribution}")]
    DistributionExhausted {
        distribution: DistributionId,
        requested: Amount,
        remaining: Amount,
    },

    #[error("Reward claim {nonce} of {validator} was already paid out")]
    DuplicateClaim { validator: ValidatorId, nonce: u64 },

    // ═══════════════════════════════════════════════════════════════════════
    // Custody
    // ═══════════════════════════════════════════════════════════════════════
    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),
}

impl ProtocolError {
    /// Branch of the error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProtocolError::TimelockNotElapsed { .. } => ErrorClass::Timelock,
            ProtocolError::NoPendingEnrollment(_)
            | ProtocolError::NoPendingDetachment(_)
            | ProtocolError::UnexpectedPhase { .. }
            | ProtocolError::AlreadyExecuted(_)
            | ProtocolError::DuplicateClaim { .. } => ErrorClass::CrossDomain,
            ProtocolError::Custody(_) => ErrorClass::Custody,
            _ => ErrorClass::Validation,
        }
    }

    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Timelock
    }
}
