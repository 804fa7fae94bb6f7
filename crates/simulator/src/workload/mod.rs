//! Workload generation for simulations.
//!
//! Draws operations from a weighted mix and turns them into commands for
//! the participants in a [`ParticipantPool`]. Timelocked follow-ups
//! (refund payouts, detachment execution) are issued once they are due.

use crate::accounts::{reward_token, stake_token, EnrollmentKey, ParticipantPool};
use crate::config::{OperationMix, WorkloadConfig};
use std::time::Duration;
use tracing::trace;
use xstake_core::Command;
use xstake_types::{Address, Bips, DelegationId, DomainId, Severity, ValidatorId};

/// Slack added to a detachment timelock before trying to execute it.
const EXECUTE_MARGIN: Duration = Duration::from_secs(2);

/// What a generated command is for, so its result can be tracked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkloadOp {
    Delegate {
        delegator: usize,
        validator: ValidatorId,
    },
    InitiateRefund(DelegationId),
    Refund(DelegationId),
    Enroll(EnrollmentKey),
    InitiateDetach(EnrollmentKey),
    ExecuteDetach(EnrollmentKey),
    Slash,
    SubmitReward,
    ClaimReward,
}

impl WorkloadOp {
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadOp::Delegate { .. } => "delegate",
            WorkloadOp::InitiateRefund(_) => "initiate_refund",
            WorkloadOp::Refund(_) => "refund",
            WorkloadOp::Enroll(_) => "enroll",
            WorkloadOp::InitiateDetach(_) => "initiate_detach",
            WorkloadOp::ExecuteDetach(_) => "execute_detach",
            WorkloadOp::Slash => "slash",
            WorkloadOp::SubmitReward => "submit_reward",
            WorkloadOp::ClaimReward => "claim_reward",
        }
    }
}

/// A command ready to submit.
#[derive(Clone, Debug)]
pub struct Submission {
    pub domain: DomainId,
    pub caller: Address,
    pub command: Command,
    pub op: WorkloadOp,
}

/// Trait for generating command workloads.
pub trait WorkloadGenerator {
    /// Generate a batch of commands.
    ///
    /// The generator marks what it submits in `pool` so the same operation
    /// is not issued twice while in flight.
    fn generate_batch(
        &mut self,
        pool: &mut ParticipantPool,
        now: Duration,
        rng: &mut impl rand::Rng,
    ) -> Vec<Submission>;

    /// Generate a single command.
    fn generate_one(
        &mut self,
        pool: &mut ParticipantPool,
        now: Duration,
        rng: &mut impl rand::Rng,
    ) -> Option<Submission>;
}

#[derive(Clone, Copy, Debug)]
enum OpKind {
    Delegate,
    Refund,
    Enroll,
    Detach,
    Slash,
    Reward,
    Claim,
}

/// Weighted mix of every operation.
pub struct MixedWorkload {
    mix: OperationMix,
    batch_size: usize,
    cross_domain_ratio: f64,
    refund_delay: Duration,
    detach_delay: Duration,
}

impl MixedWorkload {
    /// Create a new mixed workload.
    pub fn new(config: &WorkloadConfig, refund_delay: Duration, detach_delay: Duration) -> Self {
        Self {
            mix: config.mix,
            batch_size: config.batch_size,
            cross_domain_ratio: config.cross_domain_ratio,
            refund_delay,
            detach_delay,
        }
    }

    fn choose(&self, rng: &mut impl rand::Rng) -> OpKind {
        let m = &self.mix;
        let weighted = [
            (OpKind::Delegate, m.delegate),
            (OpKind::Refund, m.refund),
            (OpKind::Enroll, m.enroll),
            (OpKind::Detach, m.detach),
            (OpKind::Slash, m.slash),
            (OpKind::Reward, m.reward),
            (OpKind::Claim, m.claim),
        ];
        let mut roll = rng.gen_range(0..m.total().max(1));
        for (kind, weight) in weighted {
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        OpKind::Delegate
    }

    /// Refund payouts and detachment executions that are due.
    fn follow_ups(&self, pool: &mut ParticipantPool, now: Duration) -> Vec<Submission> {
        let mut submissions = Vec::new();

        for (index, delegation) in pool.refunds_due(now) {
            let delegator = pool.delegator(index);
            submissions.push(Submission {
                domain: delegator.domain,
                caller: delegator.address,
                command: Command::Refund { delegation },
                op: WorkloadOp::Refund(delegation),
            });
            pool.record_refunded(delegation);
        }

        for key in pool.detachments_due(now) {
            let (validator, service, asset) = key;
            let Some(v) = pool.validator(validator) else {
                continue;
            };
            submissions.push(Submission {
                domain: v.origin,
                caller: v.operator,
                command: Command::ExecuteDetach {
                    service,
                    validator,
                    asset,
                },
                op: WorkloadOp::ExecuteDetach(key),
            });
            // Not retried until the answer had time to arrive.
            pool.record_detach_sent(key, now + self.detach_delay);
        }

        submissions
    }

    fn delegate(&self, pool: &mut ParticipantPool, rng: &mut impl rand::Rng) -> Option<Submission> {
        let index = pool.random_delegator(rng)?;
        let delegator = pool.delegator(index).clone();
        let validator = match delegator.validator {
            Some(validator) => validator,
            None => {
                let candidates: Vec<ValidatorId> =
                    pool.validators_on(delegator.domain).map(|v| v.id).collect();
                if candidates.is_empty() {
                    return None;
                }
                candidates[rng.gen_range(0..candidates.len())]
            }
        };
        Some(Submission {
            domain: delegator.domain,
            caller: delegator.address,
            command: Command::Delegate {
                validator,
                asset: stake_token(delegator.domain),
                amount: rng.gen_range(100..=1_000),
            },
            op: WorkloadOp::Delegate {
                delegator: index,
                validator,
            },
        })
    }

    fn initiate_refund(
        &self,
        pool: &mut ParticipantPool,
        now: Duration,
        rng: &mut impl rand::Rng,
    ) -> Option<Submission> {
        let (index, delegation) = pool.random_active_delegation(rng)?;
        let delegator = pool.delegator(index).clone();
        pool.record_refund_initiated(delegation, now + self.refund_delay);
        Some(Submission {
            domain: delegator.domain,
            caller: delegator.address,
            command: Command::InitiateRefund { delegation },
            op: WorkloadOp::InitiateRefund(delegation),
        })
    }

    fn enroll(&self, pool: &mut ParticipantPool, rng: &mut impl rand::Rng) -> Option<Submission> {
        let validator = pool.random_validator(rng)?.clone();
        let local = !rng.gen_bool(self.cross_domain_ratio);
        let service = pool.random_service(rng, validator.origin, local)?.clone();
        let key = (validator.id, service.id, stake_token(validator.origin));
        if pool.is_tracked(&key) {
            return None;
        }
        pool.record_enroll_sent(key);
        Some(Submission {
            domain: validator.origin,
            caller: validator.operator,
            command: Command::Enroll {
                service: service.id,
                domain: service.domain,
                validator: validator.id,
                asset: key.2,
            },
            op: WorkloadOp::Enroll(key),
        })
    }

    fn detach(
        &self,
        pool: &mut ParticipantPool,
        now: Duration,
        rng: &mut impl rand::Rng,
    ) -> Option<Submission> {
        let key = pool.random_enrollment(rng)?;
        let (validator, service, asset) = key;
        let v = pool.validator(validator)?.clone();
        let domain = pool.service(service)?.domain;
        pool.record_detach_sent(key, now + self.detach_delay + EXECUTE_MARGIN);
        Some(Submission {
            domain: v.origin,
            caller: v.operator,
            command: Command::InitiateDetach {
                service,
                domain,
                validator,
                asset,
            },
            op: WorkloadOp::InitiateDetach(key),
        })
    }

    fn slash(&self, pool: &ParticipantPool, rng: &mut impl rand::Rng) -> Option<Submission> {
        let (validator, service, asset) = pool.random_enrollment(rng)?;
        let s = pool.service(service)?;
        Some(Submission {
            domain: s.domain,
            caller: s.account,
            command: Command::Slash {
                service,
                validator,
                asset,
                severity: Severity::Soft,
                bips: Bips::saturating(rng.gen_range(1..=500)),
                reason: "simulated offence".to_string(),
            },
            op: WorkloadOp::Slash,
        })
    }

    fn reward(&self, pool: &ParticipantPool, rng: &mut impl rand::Rng) -> Option<Submission> {
        let (validator, service, _) = pool.random_enrollment(rng)?;
        let s = pool.service(service)?;
        Some(Submission {
            domain: s.domain,
            caller: s.account,
            command: Command::SubmitReward {
                service,
                validator,
                asset: reward_token(s.domain),
                amount: rng.gen_range(10..=1_000),
            },
            op: WorkloadOp::SubmitReward,
        })
    }

    fn claim(&self, pool: &ParticipantPool, rng: &mut impl rand::Rng) -> Option<Submission> {
        let (validator, service, _) = pool.random_enrollment(rng)?;
        let v = pool.validator(validator)?;
        let domain = pool.service(service)?.domain;
        Some(Submission {
            domain: v.origin,
            caller: v.operator,
            command: Command::ClaimReward {
                validator,
                recipient: v.operator,
                assets: vec![reward_token(domain)],
                delegator_share: Bips::saturating(rng.gen_range(1_000..=5_000)),
                domain,
            },
            op: WorkloadOp::ClaimReward,
        })
    }
}

impl WorkloadGenerator for MixedWorkload {
    fn generate_batch(
        &mut self,
        pool: &mut ParticipantPool,
        now: Duration,
        rng: &mut impl rand::Rng,
    ) -> Vec<Submission> {
        let mut submissions = self.follow_ups(pool, now);

        for _ in 0..self.batch_size {
            if let Some(submission) = self.generate_one(pool, now, rng) {
                submissions.push(submission);
            }
        }

        submissions
    }

    fn generate_one(
        &mut self,
        pool: &mut ParticipantPool,
        now: Duration,
        rng: &mut impl rand::Rng,
    ) -> Option<Submission> {
        let kind = self.choose(rng);
        let submission = match kind {
            OpKind::Delegate => self.delegate(pool, rng),
            OpKind::Refund => self.initiate_refund(pool, now, rng),
            OpKind::Enroll => self.enroll(pool, rng),
            OpKind::Detach => self.detach(pool, now, rng),
            OpKind::Slash => self.slash(pool, rng),
            OpKind::Reward => self.reward(pool, rng),
            OpKind::Claim => self.claim(pool, rng),
        };
        if submission.is_none() {
            trace!(?kind, "Nothing to generate");
        }
        submission
    }
}
