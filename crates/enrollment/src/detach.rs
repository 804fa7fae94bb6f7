//! Detachment coordinator.
//!
//! Detaching is two-phase: initiation starts a timelock, execution after
//! the unlock time removes the enrollment. For a remote service both
//! phases are requests to the service's domain, which keeps its own
//! unlock time per request and enforces it on execution.

use crate::RejectReason;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use xstake_core::{CommandOutcome, CrossDomainMessage, Effects, Fact, ProtocolError};
use xstake_directory::{ServiceRegistry, ValidatorDirectory};
use xstake_messages::{
    DetachCompleted, DetachExecute, DetachFailed, DetachInitiated, DetachInitiatedConfirmed,
};
use xstake_pending::{PendingConfig, PendingOperations};
use xstake_types::{
    Address, Asset, CorrelationId, DomainId, OperationKind, PendingOperation, PendingPhase,
    ServiceId, ValidatorId,
};

/// A detachment initiated by a remote domain against a local service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDetachment {
    pub service: ServiceId,
    pub validator: ValidatorId,
    pub asset: Asset,
    /// Domain that initiated the detachment.
    pub origin: DomainId,
    /// Earliest time the service domain accepts execution.
    pub unlock_at: Duration,
}

/// Drives detachments of local validators and answers detachment requests
/// for local services.
#[derive(Debug, Clone)]
pub struct DetachmentCoordinator {
    local: DomainId,
    detach_delay: Duration,
    pending: PendingOperations,
    incoming: BTreeMap<CorrelationId, RemoteDetachment>,
}

impl DetachmentCoordinator {
    /// Create a coordinator for a domain.
    pub fn new(local: DomainId, detach_delay: Duration, config: PendingConfig) -> Self {
        Self {
            local,
            detach_delay,
            pending: PendingOperations::new(config),
            incoming: BTreeMap::new(),
        }
    }

    /// Timelock between initiation and execution.
    pub fn detach_delay(&self) -> Duration {
        self.detach_delay
    }

    /// Detachments of local validators in flight.
    pub fn pending(&self) -> &PendingOperations {
        &self.pending
    }

    /// Detachments initiated by remote domains against local services.
    pub fn incoming(&self) -> impl Iterator<Item = (&CorrelationId, &RemoteDetachment)> {
        self.incoming.iter()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Origin side
    // ═══════════════════════════════════════════════════════════════════════

    /// Start detaching a local validator from `service` on `domain`.
    #[allow(clippy::too_many_arguments)]
    pub fn initiate_detach(
        &mut self,
        now: Duration,
        caller: Address,
        service: ServiceId,
        domain: DomainId,
        validator: ValidatorId,
        asset: Asset,
        directory: &ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let record = directory.local_record(validator)?;
        if record.operator != caller {
            return Err(ProtocolError::NotOperator { caller, validator });
        }
        let correlation = CorrelationId::derive(OperationKind::Detach, validator, service, &asset);
        if self.pending.contains(&correlation) {
            return Err(ProtocolError::DetachAlreadyPending {
                validator,
                service,
                asset,
            });
        }
        if !record.is_enrolled(service, &asset) {
            return Err(ProtocolError::NotEnrolled {
                validator,
                service,
                asset,
            });
        }

        let mut op = PendingOperation::new(
            OperationKind::Detach,
            validator,
            service,
            asset,
            self.local,
            domain,
            now,
        );

        if domain == self.local {
            let unlock_at = now + self.detach_delay;
            op.phase = PendingPhase::Timelocked;
            op.unlock_at = Some(unlock_at);
            self.pending.open(op)?;

            info!(
                validator = %validator,
                service = %service,
                unlock_at = ?unlock_at,
                "Detachment initiated locally"
            );
            return Ok(
                Effects::new(CommandOutcome::DetachInitiated { unlock_at }).emit(
                    Fact::DetachInitiated {
                        validator,
                        service,
                        asset,
                        unlock_at: Some(unlock_at),
                    },
                ),
            );
        }

        self.pending.open(op)?;
        info!(
            correlation = %correlation,
            validator = %validator,
            service = %service,
            destination = %domain,
            "Detachment initiation sent"
        );
        Ok(Effects::new(CommandOutcome::Pending(correlation))
            .send(
                domain,
                CrossDomainMessage::DetachInitiated(DetachInitiated {
                    correlation,
                    service,
                    validator,
                    asset,
                }),
            )
            .emit(Fact::DetachInitiated {
                validator,
                service,
                asset,
                unlock_at: None,
            }))
    }

    /// The service's domain accepted the initiation and reported its unlock
    /// time.
    pub fn handle_detach_initiated_confirmed(
        &mut self,
        from: DomainId,
        message: DetachInitiatedConfirmed,
    ) -> Result<Effects, ProtocolError> {
        let correlation = message.correlation;
        let op = self
            .pending
            .get_mut(&correlation)
            .filter(|op| op.kind == OperationKind::Detach && op.destination == from)
            .ok_or(ProtocolError::NoPendingDetachment(correlation))?;
        if op.phase != PendingPhase::AwaitingConfirmation {
            return Err(ProtocolError::UnexpectedPhase { correlation });
        }
        op.phase = PendingPhase::Timelocked;
        op.unlock_at = Some(message.unlock_at);

        info!(
            correlation = %correlation,
            validator = %op.validator,
            unlock_at = ?message.unlock_at,
            "Detachment timelock started"
        );
        Ok(Effects::done().emit(Fact::DetachInitiated {
            validator: op.validator,
            service: op.service,
            asset: op.asset,
            unlock_at: Some(message.unlock_at),
        }))
    }

    /// Finish a detachment whose timelock has elapsed.
    ///
    /// Local detachments complete here. Remote ones send the execution
    /// request and complete when the service's domain answers.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_detach(
        &mut self,
        now: Duration,
        caller: Address,
        service: ServiceId,
        validator: ValidatorId,
        asset: Asset,
        directory: &mut ValidatorDirectory,
        registry: &mut ServiceRegistry,
    ) -> Result<Effects, ProtocolError> {
        let record = directory.local_record(validator)?;
        if record.operator != caller {
            return Err(ProtocolError::NotOperator { caller, validator });
        }
        let correlation = CorrelationId::derive(OperationKind::Detach, validator, service, &asset);
        let op = self
            .pending
            .get_kind(&correlation, OperationKind::Detach)
            .ok_or(ProtocolError::NoUnlockTime(correlation))?;
        if op.phase == PendingPhase::AwaitingCompletion {
            return Err(ProtocolError::UnexpectedPhase { correlation });
        }
        let unlock_at = op
            .unlock_at
            .ok_or(ProtocolError::NoUnlockTime(correlation))?;
        if now < unlock_at {
            return Err(ProtocolError::TimelockNotElapsed { now, unlock_at });
        }

        if op.is_cross_domain() {
            let destination = op.destination;
            if let Some(op) = self.pending.get_mut(&correlation) {
                op.phase = PendingPhase::AwaitingCompletion;
            }
            info!(
                correlation = %correlation,
                validator = %validator,
                destination = %destination,
                "Detachment execution sent"
            );
            return Ok(Effects::new(CommandOutcome::Pending(correlation)).send(
                destination,
                CrossDomainMessage::DetachExecute(DetachExecute {
                    correlation,
                    service,
                    validator,
                    asset,
                }),
            ));
        }

        self.pending.take(&correlation);
        registry.remove_member(service, validator, &asset);
        directory
            .local_record_mut(validator)?
            .remove_enrollment(service, &asset);

        info!(validator = %validator, service = %service, asset = %asset, "Detached locally");
        Ok(Effects::new(CommandOutcome::Detached).emit(Fact::DetachCompleted {
            validator,
            service,
            asset,
        }))
    }

    /// The service's domain removed the validator from its roster.
    pub fn handle_detach_completed(
        &mut self,
        from: DomainId,
        message: DetachCompleted,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let correlation = message.correlation;
        let op = self
            .pending
            .get_kind(&correlation, OperationKind::Detach)
            .filter(|op| op.destination == from)
            .ok_or(ProtocolError::NoPendingDetachment(correlation))?;
        if op.phase != PendingPhase::AwaitingCompletion {
            return Err(ProtocolError::UnexpectedPhase { correlation });
        }
        let (validator, service, asset) = (op.validator, op.service, op.asset);
        self.pending.take(&correlation);

        directory
            .local_record_mut(validator)?
            .remove_enrollment(service, &asset);

        info!(validator = %validator, service = %service, from = %from, "Detachment completed");
        Ok(Effects::done().emit(Fact::DetachCompleted {
            validator,
            service,
            asset,
        }))
    }

    /// The service's domain rejected a detachment step. The pending entry is
    /// cleared and the enrollment is left in place.
    pub fn handle_detach_failed(
        &mut self,
        from: DomainId,
        message: DetachFailed,
    ) -> Result<Effects, ProtocolError> {
        let correlation = message.correlation;
        let op = self
            .pending
            .get_kind(&correlation, OperationKind::Detach)
            .filter(|op| op.destination == from)
            .ok_or(ProtocolError::NoPendingDetachment(correlation))?;

        warn!(
            correlation = %correlation,
            validator = %op.validator,
            service = %op.service,
            phase = ?op.phase,
            reason = %message.reason,
            "Detachment rejected"
        );
        self.pending.take(&correlation);
        Ok(Effects::done().emit(Fact::DetachFailed {
            correlation,
            reason: message.reason,
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Service side
    // ═══════════════════════════════════════════════════════════════════════

    /// Start the service-side timelock for a remote validator.
    ///
    /// A repeated initiation answers with the unlock time already recorded.
    pub fn handle_detach_initiated(
        &mut self,
        now: Duration,
        from: DomainId,
        message: DetachInitiated,
        directory: &ValidatorDirectory,
        registry: &ServiceRegistry,
    ) -> Effects {
        let DetachInitiated {
            correlation,
            service,
            validator,
            asset,
        } = message;

        let verdict = match registry.get(service) {
            None => Err(RejectReason::InvalidService),
            Some(record) if !record.has_member(validator, &asset) => {
                Err(RejectReason::NotEnrolled)
            }
            Some(_) if directory.get(validator).map(|r| r.origin) != Some(from) => {
                Err(RejectReason::OriginMismatch)
            }
            Some(_) => Ok(()),
        };
        if let Err(reason) = verdict {
            return Self::reject(from, correlation, validator, service, reason);
        }

        let unlock_at = match self.incoming.get(&correlation) {
            Some(existing) => {
                debug!(correlation = %correlation, "Detachment already initiated, answering again");
                existing.unlock_at
            }
            None => {
                let unlock_at = now + self.detach_delay;
                self.incoming.insert(
                    correlation,
                    RemoteDetachment {
                        service,
                        validator,
                        asset,
                        origin: from,
                        unlock_at,
                    },
                );
                info!(
                    validator = %validator,
                    service = %service,
                    origin = %from,
                    unlock_at = ?unlock_at,
                    "Remote detachment timelock started"
                );
                unlock_at
            }
        };

        Effects::done().send(
            from,
            CrossDomainMessage::DetachInitiatedConfirmed(DetachInitiatedConfirmed {
                correlation,
                unlock_at,
            }),
        )
    }

    /// Remove a remote validator from a local service once its timelock
    /// has elapsed on this domain.
    pub fn handle_detach_execute(
        &mut self,
        now: Duration,
        from: DomainId,
        message: DetachExecute,
        directory: &mut ValidatorDirectory,
        registry: &mut ServiceRegistry,
    ) -> Effects {
        let DetachExecute {
            correlation,
            service,
            validator,
            asset,
        } = message;

        let Some(detachment) = self
            .incoming
            .get(&correlation)
            .filter(|d| d.origin == from)
        else {
            return Self::reject(from, correlation, validator, service, RejectReason::NoUnlockTime);
        };
        if now < detachment.unlock_at {
            return Self::reject(
                from,
                correlation,
                validator,
                service,
                RejectReason::TimelockNotElapsed,
            );
        }

        self.incoming.remove(&correlation);
        registry.remove_member(service, validator, &asset);
        if let Some(record) = directory.get_mut(validator) {
            record.remove_enrollment(service, &asset);
        }

        info!(validator = %validator, service = %service, origin = %from, "Remote validator detached");
        Effects::done().send(
            from,
            CrossDomainMessage::DetachCompleted(DetachCompleted {
                correlation,
                service,
                validator,
                asset,
            }),
        )
    }

    fn reject(
        to: DomainId,
        correlation: CorrelationId,
        validator: ValidatorId,
        service: ServiceId,
        reason: RejectReason,
    ) -> Effects {
        warn!(
            validator = %validator,
            service = %service,
            origin = %to,
            reason = %reason,
            "Rejecting detachment"
        );
        Effects::done().send(
            to,
            CrossDomainMessage::DetachFailed(DetachFailed {
                correlation,
                reason: reason.to_string(),
            }),
        )
    }
}
