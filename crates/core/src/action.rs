//! Outbound actions and protocol facts.

use crate::{CrossDomainMessage, ProtocolError, RequestId, Settlement};
use std::time::Duration;
use xstake_types::{
    Address, Amount, Asset, Bips, CorrelationId, DelegationId, DistributionId, DomainId, Hash,
    ServiceId, SlashId, ValidatorId,
};

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Applied, nothing further to report.
    Done,
    /// A delegation was created.
    Delegated(DelegationId),
    /// A refund was accounted for and its timelock started.
    RefundInitiated {
        refundable: Amount,
        unlock_at: Duration,
    },
    /// A refund was paid out.
    Refunded { amount: Amount },
    /// A cross-domain operation was sent and awaits an answer.
    Pending(CorrelationId),
    /// An enrollment completed synchronously.
    Enrolled,
    /// A local detachment started its timelock.
    DetachInitiated { unlock_at: Duration },
    /// A local detachment completed.
    Detached,
    /// A slash was recorded.
    Slashed { slash_id: SlashId, amount: Amount },
    /// Rewards were claimed locally.
    RewardClaimed {
        paid: Vec<(Asset, Amount)>,
        distributions: Vec<DistributionId>,
    },
    /// A delegator claimed its share.
    DelegatorRewardClaimed { amount: Amount },
}

/// Observable protocol facts, emitted as they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    ValidatorRegistered {
        validator: ValidatorId,
    },
    ServiceRegistered {
        service: ServiceId,
    },
    StakeBonded {
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
    },
    StakeAttested {
        validator: ValidatorId,
        amount: Amount,
        as_of: Duration,
    },
    DelegationFinalized {
        id: DelegationId,
        validator: ValidatorId,
        delegator: Address,
        asset: Asset,
        amount: Amount,
    },
    RefundInitiated {
        id: DelegationId,
        refundable: Amount,
    },
    Refunded {
        id: DelegationId,
        delegator: Address,
        amount: Amount,
    },
    EnrollmentPending {
        correlation: CorrelationId,
        destination: DomainId,
    },
    EnrollmentConfirmed {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
    },
    EnrollmentFailed {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
        reason: String,
    },
    DetachInitiated {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
        unlock_at: Option<Duration>,
    },
    DetachCompleted {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
    },
    DetachFailed {
        correlation: CorrelationId,
        reason: String,
    },
    Slashed {
        slash_id: SlashId,
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
        amount: Amount,
        bips: Bips,
    },
    RewardSubmitted {
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
        amount: Amount,
    },
    RewardClaimed {
        validator: ValidatorId,
        recipient: Address,
        asset: Asset,
        amount: Amount,
    },
    RemoteClaimCompleted {
        validator: ValidatorId,
        from: DomainId,
        paid: Vec<(Asset, Amount)>,
    },
    DistributionOpened {
        id: DistributionId,
        validator: ValidatorId,
        asset: Asset,
        total: Amount,
    },
    CommitmentRootSet {
        id: DistributionId,
        root: Hash,
    },
    DelegatorRewardClaimed {
        id: DistributionId,
        delegator: Address,
        amount: Amount,
    },
    /// The custody collaborator refused a settlement after bookkeeping
    /// completed. Requires operator attention.
    SettlementFailed {
        settlement: Settlement,
        error: String,
    },
}

/// Actions returned by the state machine for the runner to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand a message to the messaging channel.
    SendMessage {
        destination: DomainId,
        message: CrossDomainMessage,
    },

    /// Answer a command.
    EmitCommandResult {
        request_id: RequestId,
        result: Result<CommandOutcome, ProtocolError>,
    },

    /// Publish a protocol fact.
    EmitFact(Fact),
}

impl Action {
    /// Get a human-readable name for this action.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendMessage { .. } => "SendMessage",
            Action::EmitCommandResult { .. } => "EmitCommandResult",
            Action::EmitFact(_) => "EmitFact",
        }
    }
}
