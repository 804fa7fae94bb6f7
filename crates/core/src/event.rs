//! Inbound events.

use crate::{CrossDomainMessage, RequestId};
use std::time::Duration;
use xstake_types::{
    Address, Amount, Asset, Bips, DelegationId, DelegatorShare, DistributionId, DomainId, Hash,
    MerkleProof, ServiceId, Severity, SlashPolicy, ValidatorId,
};

/// A call into a domain by an account on that domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ═══════════════════════════════════════════════════════════════════════
    // Directory
    // ═══════════════════════════════════════════════════════════════════════
    /// Register a validator native to this domain.
    RegisterValidator {
        validator: ValidatorId,
        custody: Address,
        operator: Address,
    },
    /// Register a service hosted on this domain.
    RegisterService {
        service: ServiceId,
        account: Address,
        policy: SlashPolicy,
    },
    /// Add or replace a service's eligibility requirement.
    SetRequirement {
        service: ServiceId,
        token: Asset,
        chain: DomainId,
        minimum: Amount,
    },
    /// Self-bond stake from the operator into the validator's custody account.
    Bond {
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
    },
    /// Record an externally attested native stake balance.
    AttestStake {
        validator: ValidatorId,
        amount: Amount,
        as_of: Duration,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Delegation
    // ═══════════════════════════════════════════════════════════════════════
    Delegate {
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
    },
    InitiateRefund {
        delegation: DelegationId,
    },
    Refund {
        delegation: DelegationId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Enrollment & detachment
    // ═══════════════════════════════════════════════════════════════════════
    Enroll {
        service: ServiceId,
        domain: DomainId,
        validator: ValidatorId,
        asset: Asset,
    },
    InitiateDetach {
        service: ServiceId,
        domain: DomainId,
        validator: ValidatorId,
        asset: Asset,
    },
    ExecuteDetach {
        service: ServiceId,
        validator: ValidatorId,
        asset: Asset,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Slashing
    // ═══════════════════════════════════════════════════════════════════════
    Slash {
        service: ServiceId,
        validator: ValidatorId,
        asset: Asset,
        severity: Severity,
        bips: Bips,
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Rewards
    // ═══════════════════════════════════════════════════════════════════════
    SubmitReward {
        service: ServiceId,
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
    },
    ClaimReward {
        validator: ValidatorId,
        recipient: Address,
        assets: Vec<Asset>,
        delegator_share: Bips,
        domain: DomainId,
    },
    SetCommitmentRoot {
        distribution: DistributionId,
        root: Hash,
    },
    ClaimDelegatorReward {
        share: DelegatorShare,
        index: u64,
        distribution: DistributionId,
        proof: MerkleProof,
    },
}

impl Command {
    /// Get a human-readable name for this command.
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::RegisterValidator { .. } => "RegisterValidator",
            Command::RegisterService { .. } => "RegisterService",
            Command::SetRequirement { .. } => "SetRequirement",
            Command::Bond { .. } => "Bond",
            Command::AttestStake { .. } => "AttestStake",
            Command::Delegate { .. } => "Delegate",
            Command::InitiateRefund { .. } => "InitiateRefund",
            Command::Refund { .. } => "Refund",
            Command::Enroll { .. } => "Enroll",
            Command::InitiateDetach { .. } => "InitiateDetach",
            Command::ExecuteDetach { .. } => "ExecuteDetach",
            Command::Slash { .. } => "Slash",
            Command::SubmitReward { .. } => "SubmitReward",
            Command::ClaimReward { .. } => "ClaimReward",
            Command::SetCommitmentRoot { .. } => "SetCommitmentRoot",
            Command::ClaimDelegatorReward { .. } => "ClaimDelegatorReward",
        }
    }
}

/// Events processed by a domain state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A local account called into the domain.
    Command {
        request_id: RequestId,
        caller: Address,
        command: Command,
    },

    /// The messaging channel delivered an authenticated message.
    MessageReceived {
        from: DomainId,
        message: CrossDomainMessage,
    },
}

impl Event {
    /// Get a human-readable name for this event.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Command { command, .. } => command.type_name(),
            Event::MessageReceived { message, .. } => message.type_name(),
        }
    }
}
