//! Enrollment coordinator.

use crate::RejectReason;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use xstake_core::{
    CommandOutcome, CrossDomainMessage, EligibilityOracle, Effects, Fact, ProtocolError,
};
use xstake_directory::{ServiceRegistry, ValidatorDirectory};
use xstake_messages::{EnrollConfirmed, EnrollFailed, EnrollRequest};
use xstake_pending::{PendingConfig, PendingOperations};
use xstake_types::{
    Address, Asset, CorrelationId, DomainId, OperationKind, PendingOperation, ServiceId,
    ValidatorId,
};

/// Drives enrollments of local validators and answers enrollment requests
/// for local services.
#[derive(Debug, Clone)]
pub struct EnrollmentCoordinator {
    local: DomainId,
    pending: PendingOperations,
    /// Sequence number of the last request sent from this domain.
    issued: u64,
    /// Highest request sequence accepted per remote membership.
    accepted: BTreeMap<(ValidatorId, ServiceId, Asset), u64>,
}

impl EnrollmentCoordinator {
    /// Create a coordinator for a domain.
    pub fn new(local: DomainId, config: PendingConfig) -> Self {
        Self {
            local,
            pending: PendingOperations::new(config),
            issued: 0,
            accepted: BTreeMap::new(),
        }
    }

    /// Enrollments awaiting an answer.
    pub fn pending(&self) -> &PendingOperations {
        &self.pending
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Origin side
    // ═══════════════════════════════════════════════════════════════════════

    /// Enroll a local validator with `service` on `domain` for `asset`.
    ///
    /// Same-domain enrollments complete synchronously. Cross-domain ones
    /// return `CommandOutcome::Pending` and finish when the answer arrives.
    #[allow(clippy::too_many_arguments)]
    pub fn enroll(
        &mut self,
        now: Duration,
        caller: Address,
        service: ServiceId,
        domain: DomainId,
        validator: ValidatorId,
        asset: Asset,
        directory: &mut ValidatorDirectory,
        registry: &mut ServiceRegistry,
    ) -> Result<Effects, ProtocolError> {
        if domain == self.local && !registry.contains(service) {
            return Err(ProtocolError::UnknownService(service));
        }
        let record = directory.local_record(validator)?;
        if record.operator != caller {
            return Err(ProtocolError::NotOperator { caller, validator });
        }
        let correlation = CorrelationId::derive(OperationKind::Enroll, validator, service, &asset);
        if self.pending.contains(&correlation) {
            return Err(ProtocolError::EnrollmentAlreadyPending {
                validator,
                service,
                asset,
            });
        }
        if record.is_enrolled(service, &asset) {
            return Err(ProtocolError::AlreadyEnrolled {
                validator,
                service,
                asset,
            });
        }

        if domain == self.local {
            let eligible = registry.get(service).is_some_and(|s| {
                s.requirements
                    .check_eligibility(&asset, record.origin, record.total_stake(&asset))
            });
            if !eligible {
                return Err(ProtocolError::Ineligible { validator, service });
            }

            registry.add_member(service, validator, asset);
            if let Ok(record) = directory.local_record_mut(validator) {
                record.add_enrollment(service, asset);
            }

            info!(validator = %validator, service = %service, asset = %asset, "Enrolled locally");
            return Ok(Effects::new(CommandOutcome::Enrolled).emit(Fact::EnrollmentConfirmed {
                validator,
                service,
                asset,
            }));
        }

        let descriptor = record.descriptor(asset);
        self.pending.open(PendingOperation::new(
            OperationKind::Enroll,
            validator,
            service,
            asset,
            self.local,
            domain,
            now,
        ))?;
        self.issued += 1;

        info!(
            correlation = %correlation,
            validator = %validator,
            service = %service,
            destination = %domain,
            sequence = self.issued,
            "Enrollment sent"
        );
        Ok(Effects::new(CommandOutcome::Pending(correlation))
            .send(
                domain,
                CrossDomainMessage::Enroll(EnrollRequest {
                    correlation,
                    service,
                    validator: descriptor,
                    reply_to: self.local,
                    sequence: self.issued,
                }),
            )
            .emit(Fact::EnrollmentPending {
                correlation,
                destination: domain,
            }))
    }

    /// The service's domain enrolled the validator.
    pub fn handle_enroll_confirmed(
        &mut self,
        from: DomainId,
        message: EnrollConfirmed,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let op = self
            .pending
            .get_kind(&message.correlation, OperationKind::Enroll)
            .filter(|op| op.destination == from)
            .ok_or(ProtocolError::NoPendingEnrollment(message.correlation))?;
        let (validator, service, asset) = (op.validator, op.service, op.asset);
        self.pending.take(&message.correlation);

        let record = directory.local_record_mut(validator)?;
        record.add_enrollment(service, asset);

        info!(validator = %validator, service = %service, from = %from, "Enrollment confirmed");
        Ok(Effects::done().emit(Fact::EnrollmentConfirmed {
            validator,
            service,
            asset,
        }))
    }

    /// The service's domain rejected the enrollment.
    pub fn handle_enroll_failed(
        &mut self,
        from: DomainId,
        message: EnrollFailed,
    ) -> Result<Effects, ProtocolError> {
        let op = self
            .pending
            .get_kind(&message.correlation, OperationKind::Enroll)
            .filter(|op| op.destination == from)
            .ok_or(ProtocolError::NoPendingEnrollment(message.correlation))?;
        let (validator, service, asset) = (op.validator, op.service, op.asset);
        self.pending.take(&message.correlation);

        warn!(
            validator = %validator,
            service = %service,
            from = %from,
            reason = %message.reason,
            "Enrollment rejected"
        );
        Ok(Effects::done().emit(Fact::EnrollmentFailed {
            validator,
            service,
            asset,
            reason: message.reason,
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Service side
    // ═══════════════════════════════════════════════════════════════════════

    /// Answer an enrollment request for a local service.
    ///
    /// Answers with a confirmation on success or a failure with a reason.
    /// A redelivered request for a pair still on the roster is confirmed
    /// again without being applied twice. A request older than the last
    /// accepted one, or a redelivery of it after the pair left the roster,
    /// is dropped unanswered: its correlation id may already belong to a
    /// newer enrollment at the origin.
    pub fn handle_incoming_enrollment(
        &mut self,
        from: DomainId,
        request: EnrollRequest,
        directory: &mut ValidatorDirectory,
        registry: &mut ServiceRegistry,
    ) -> Effects {
        let EnrollRequest {
            correlation,
            service,
            validator: descriptor,
            reply_to,
            sequence,
        } = request;
        let (validator, asset) = (descriptor.id, descriptor.asset);
        let key = (validator, service, asset);
        let last_accepted = self.accepted.get(&key).copied();
        let on_roster = registry
            .get(service)
            .is_some_and(|record| record.has_member(validator, &asset));
        let stale = last_accepted
            .is_some_and(|last| sequence < last || (sequence == last && !on_roster));

        let verdict = match registry.get(service) {
            None => Err(RejectReason::InvalidService),
            Some(_) if descriptor.origin != from => Err(RejectReason::OriginMismatch),
            Some(_) if stale => {
                warn!(
                    correlation = %correlation,
                    validator = %validator,
                    service = %service,
                    sequence,
                    "Dropping stale enrollment request"
                );
                return Effects::done();
            }
            Some(_) if on_roster => Ok(false),
            Some(record)
                if record.requirements.check_eligibility(
                    &asset,
                    descriptor.origin,
                    descriptor.stake,
                ) =>
            {
                Ok(true)
            }
            Some(_) => Err(RejectReason::Ineligible),
        };

        match verdict {
            Ok(apply) => {
                if last_accepted < Some(sequence) {
                    self.accepted.insert(key, sequence);
                }
                if apply {
                    directory
                        .upsert_mirror(&descriptor)
                        .add_enrollment(service, asset);
                    registry.add_member(service, validator, asset);
                    info!(
                        validator = %validator,
                        service = %service,
                        origin = %from,
                        stake = descriptor.stake,
                        "Remote validator enrolled"
                    );
                } else {
                    debug!(correlation = %correlation, "Enrollment already applied, confirming again");
                }
                Effects::done().send(
                    reply_to,
                    CrossDomainMessage::EnrollConfirmed(EnrollConfirmed {
                        correlation,
                        service,
                        validator,
                        asset,
                    }),
                )
            }
            Err(reason) => {
                warn!(
                    validator = %validator,
                    service = %service,
                    origin = %from,
                    reason = %reason,
                    "Rejecting enrollment"
                );
                Effects::done().send(
                    reply_to,
                    CrossDomainMessage::EnrollFailed(EnrollFailed {
                        correlation,
                        service,
                        validator,
                        asset,
                        reason: reason.to_string(),
                    }),
                )
            }
        }
    }
}
