//! Domain state machine.

use crate::DomainConfig;
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use xstake_core::{
    Action, Command, CrossDomainMessage, Custody, Effects, Event, Fact, ProtocolError, RequestId,
    StateMachine,
};
use xstake_delegation::DelegationLedger;
use xstake_directory::{ServiceRegistry, ValidatorDirectory};
use xstake_enrollment::{DetachmentCoordinator, EnrollmentCoordinator};
use xstake_rewards::RewardsDistributor;
use xstake_slashing::SlashingLedger;
use xstake_types::{Address, DomainId, PendingOperation};

/// Every component of one domain, plus its custody ledger.
///
/// Commands and messages are routed to the owning component. A component
/// validates, performs any inbound custody pull, updates its bookkeeping and
/// returns [`Effects`]; outbound custody movements are applied here, after
/// the component has returned.
pub struct DomainStateMachine<C> {
    config: DomainConfig,
    now: Duration,

    directory: ValidatorDirectory,
    registry: ServiceRegistry,
    delegation: DelegationLedger,
    enrollment: EnrollmentCoordinator,
    detachment: DetachmentCoordinator,
    slashing: SlashingLedger,
    rewards: RewardsDistributor,

    custody: C,
}

impl<C: Custody> DomainStateMachine<C> {
    /// Create a domain with empty state.
    pub fn new(config: DomainConfig, custody: C) -> Self {
        let domain = config.domain;
        Self {
            directory: ValidatorDirectory::new(domain),
            registry: ServiceRegistry::new(domain),
            delegation: DelegationLedger::new(config.refund_delay),
            enrollment: EnrollmentCoordinator::new(domain, config.pending.clone()),
            detachment: DetachmentCoordinator::new(
                domain,
                config.detach_delay,
                config.pending.clone(),
            ),
            slashing: SlashingLedger::new(domain),
            rewards: RewardsDistributor::new(
                domain,
                config.rewards_vault,
                config.distribution_manager,
            ),
            now: Duration::ZERO,
            config,
            custody,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn domain(&self) -> DomainId {
        self.config.domain
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn directory(&self) -> &ValidatorDirectory {
        &self.directory
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn delegation(&self) -> &DelegationLedger {
        &self.delegation
    }

    pub fn enrollment(&self) -> &EnrollmentCoordinator {
        &self.enrollment
    }

    pub fn detachment(&self) -> &DetachmentCoordinator {
        &self.detachment
    }

    pub fn slashing(&self) -> &SlashingLedger {
        &self.slashing
    }

    pub fn rewards(&self) -> &RewardsDistributor {
        &self.rewards
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    /// Mutable custody, for funding accounts outside the protocol.
    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    /// Pending enrollments and detachments that have waited longer than the
    /// configured threshold.
    ///
    /// Nothing resolves these automatically; they stay pending until the
    /// answer arrives.
    pub fn stale_operations(&self) -> Vec<&PendingOperation> {
        let mut stale = self.enrollment.pending().stale(self.now);
        stale.extend(self.detachment.pending().stale(self.now));
        stale
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Routing
    // ═══════════════════════════════════════════════════════════════════════

    fn on_command(
        &mut self,
        request_id: RequestId,
        caller: Address,
        command: Command,
    ) -> Vec<Action> {
        let name = command.type_name();
        match self.execute(caller, command) {
            Ok(effects) => {
                let outcome = effects.outcome.clone();
                let mut actions = self.finish(effects);
                actions.push(Action::EmitCommandResult {
                    request_id,
                    result: Ok(outcome),
                });
                actions
            }
            Err(e) => {
                debug!(
                    domain = %self.config.domain,
                    request = %request_id,
                    command = name,
                    caller = %caller,
                    error = %e,
                    "Command rejected"
                );
                vec![Action::EmitCommandResult {
                    request_id,
                    result: Err(e),
                }]
            }
        }
    }

    fn on_message(&mut self, from: DomainId, message: CrossDomainMessage) -> Vec<Action> {
        let name = message.type_name();
        match self.receive(from, message) {
            Ok(effects) => self.finish(effects),
            Err(e) => {
                warn!(
                    domain = %self.config.domain,
                    from = %from,
                    message = name,
                    error = %e,
                    "Inbound message rejected"
                );
                vec![]
            }
        }
    }

    fn execute(&mut self, caller: Address, command: Command) -> Result<Effects, ProtocolError> {
        let now = self.now;
        match command {
            Command::RegisterValidator {
                validator,
                custody,
                operator,
            } => self.directory.register_validator(validator, custody, operator),
            Command::RegisterService {
                service,
                account,
                policy,
            } => self.registry.register_service(service, account, policy),
            Command::SetRequirement {
                service,
                token,
                chain,
                minimum,
            } => self
                .registry
                .set_requirement(caller, service, token, chain, minimum),
            Command::Bond {
                validator,
                asset,
                amount,
            } => self
                .directory
                .bond(caller, validator, asset, amount, &mut self.custody),
            Command::AttestStake {
                validator,
                amount,
                as_of,
            } => self
                .directory
                .attest_external_stake(caller, validator, amount, as_of),

            Command::Delegate {
                validator,
                asset,
                amount,
            } => self.delegation.delegate(
                now,
                caller,
                validator,
                asset,
                amount,
                &mut self.directory,
                &mut self.custody,
            ),
            Command::InitiateRefund { delegation } => {
                let validator = self.delegation.delegation(&delegation).map(|d| d.validator);
                let slashes = validator
                    .into_iter()
                    .flat_map(|v| self.slashing.slashes_for(v));
                self.delegation
                    .initiate_refund(now, caller, delegation, slashes, &mut self.directory)
            }
            Command::Refund { delegation } => {
                self.delegation
                    .refund(now, caller, delegation, &self.directory)
            }

            Command::Enroll {
                service,
                domain,
                validator,
                asset,
            } => self.enrollment.enroll(
                now,
                caller,
                service,
                domain,
                validator,
                asset,
                &mut self.directory,
                &mut self.registry,
            ),
            Command::InitiateDetach {
                service,
                domain,
                validator,
                asset,
            } => self.detachment.initiate_detach(
                now,
                caller,
                service,
                domain,
                validator,
                asset,
                &self.directory,
            ),
            Command::ExecuteDetach {
                service,
                validator,
                asset,
            } => self.detachment.execute_detach(
                now,
                caller,
                service,
                validator,
                asset,
                &mut self.directory,
                &mut self.registry,
            ),

            Command::Slash {
                service,
                validator,
                asset,
                severity,
                bips,
                reason,
            } => self.slashing.slash(
                now,
                caller,
                service,
                validator,
                asset,
                severity,
                bips,
                reason,
                &self.registry,
                &mut self.directory,
            ),

            Command::SubmitReward {
                service,
                validator,
                asset,
                amount,
            } => self.rewards.submit_reward(
                caller,
                service,
                validator,
                asset,
                amount,
                &self.registry,
                &mut self.directory,
                &mut self.custody,
            ),
            Command::ClaimReward {
                validator,
                recipient,
                assets,
                delegator_share,
                domain,
            } => self.rewards.claim_reward(
                now,
                caller,
                validator,
                recipient,
                assets,
                delegator_share,
                domain,
                &mut self.directory,
            ),
            Command::SetCommitmentRoot { distribution, root } => {
                self.rewards.set_commitment_root(caller, distribution, root)
            }
            Command::ClaimDelegatorReward {
                share,
                index,
                distribution,
                proof,
            } => self
                .rewards
                .claim_delegator_reward(share, index, distribution, &proof),
        }
    }

    fn receive(
        &mut self,
        from: DomainId,
        message: CrossDomainMessage,
    ) -> Result<Effects, ProtocolError> {
        let now = self.now;
        match message {
            CrossDomainMessage::Enroll(request) => Ok(self.enrollment.handle_incoming_enrollment(
                from,
                request,
                &mut self.directory,
                &mut self.registry,
            )),
            CrossDomainMessage::EnrollConfirmed(m) => {
                self.enrollment
                    .handle_enroll_confirmed(from, m, &mut self.directory)
            }
            CrossDomainMessage::EnrollFailed(m) => self.enrollment.handle_enroll_failed(from, m),

            CrossDomainMessage::DetachInitiated(m) => Ok(self.detachment.handle_detach_initiated(
                now,
                from,
                m,
                &self.directory,
                &self.registry,
            )),
            CrossDomainMessage::DetachInitiatedConfirmed(m) => {
                self.detachment.handle_detach_initiated_confirmed(from, m)
            }
            CrossDomainMessage::DetachExecute(m) => Ok(self.detachment.handle_detach_execute(
                now,
                from,
                m,
                &mut self.directory,
                &mut self.registry,
            )),
            CrossDomainMessage::DetachCompleted(m) => {
                self.detachment
                    .handle_detach_completed(from, m, &mut self.directory)
            }
            CrossDomainMessage::DetachFailed(m) => self.detachment.handle_detach_failed(from, m),

            CrossDomainMessage::Slash(notice) => {
                self.slashing
                    .handle_incoming_slash(from, notice, &mut self.directory)
            }

            CrossDomainMessage::ClaimReward(request) => {
                self.rewards
                    .handle_incoming_claim(now, from, request, &mut self.directory)
            }
            CrossDomainMessage::ClaimRewardConfirmed(m) => {
                Ok(self.rewards.handle_claim_confirmed(from, m))
            }
        }
    }

    /// Apply settlements, then hand back the component's actions.
    ///
    /// Bookkeeping is already final when this runs. A settlement custody
    /// refuses is reported as a fact and does not undo it.
    fn finish(&mut self, effects: Effects) -> Vec<Action> {
        let Effects {
            settlements,
            mut actions,
            ..
        } = effects;

        for settlement in settlements {
            if let Err(e) = settlement.apply(&mut self.custody) {
                error!(
                    domain = %self.config.domain,
                    settlement = ?settlement,
                    error = %e,
                    "Settlement refused by custody"
                );
                actions.push(Action::EmitFact(Fact::SettlementFailed {
                    settlement,
                    error: e.to_string(),
                }));
            }
        }
        actions
    }
}

impl<C: Custody> StateMachine for DomainStateMachine<C> {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        trace!(domain = %self.config.domain, event = event.type_name(), "Handling event");
        match event {
            Event::Command {
                request_id,
                caller,
                command,
            } => self.on_command(request_id, caller, command),
            Event::MessageReceived { from, message } => self.on_message(from, message),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}

impl<C> std::fmt::Debug for DomainStateMachine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainStateMachine")
            .field("domain", &self.config.domain)
            .field("now", &self.now)
            .field("validators", &self.directory.len())
            .field("services", &self.registry.len())
            .field("delegations", &self.delegation.len())
            .field("slashes", &self.slashing.len())
            .field("distributions", &self.rewards.len())
            .finish()
    }
}
