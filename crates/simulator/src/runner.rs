//! Long-running workload simulator.

use crate::accounts::{EnrollmentKey, ParticipantPool};
use crate::config::{ConfigError, SimulatorConfig};
use crate::metrics::{MetricsCollector, SimulationReport};
use crate::workload::{MixedWorkload, WorkloadGenerator, WorkloadOp};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use xstake_core::{CommandOutcome, Fact, ProtocolError, RequestId};
use xstake_node::DomainConfig;
use xstake_simulation::{RecordedFact, SimulationRunner};
use xstake_types::{Amount, CorrelationId, DomainId, OperationKind};

/// Errors setting up a simulator.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create latency histogram: {0}")]
    Metrics(#[from] hdrhistogram::CreationError),

    #[error("Genesis command {command} failed: {error}")]
    Genesis {
        command: &'static str,
        error: ProtocolError,
    },

    #[error("Genesis command {0} was not answered")]
    GenesisUnanswered(&'static str),
}

/// Drives a [`SimulationRunner`] with a generated workload.
pub struct Simulator {
    config: SimulatorConfig,
    runner: SimulationRunner,
    pool: ParticipantPool,
    workload: MixedWorkload,
    rng: ChaCha8Rng,
    metrics: MetricsCollector,
    /// Submitted commands not yet answered, with their submission time.
    outstanding: BTreeMap<RequestId, (WorkloadOp, Duration)>,
    /// Index of the first fact not yet inspected.
    fact_cursor: usize,
}

impl Simulator {
    /// Build the domains, fund every participant and run genesis.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate()?;

        let mut runner = SimulationRunner::new(config.to_network_config(), config.seed);
        for domain in domains(&config) {
            runner.add_domain(
                DomainConfig::new(domain)
                    .with_refund_delay(config.refund_delay())
                    .with_detach_delay(config.detach_delay()),
            );
        }

        let pool = ParticipantPool::generate(
            config.num_domains,
            config.validators_per_domain,
            config.services_per_domain,
            config.delegators_per_domain,
        );
        for (domain, account, asset, amount) in
            pool.genesis_balances(Amount::from(config.initial_balance))
        {
            if let Some(custody) = runner.custody_mut(domain) {
                custody.mint(account, asset, amount);
            }
        }

        let requests: Vec<_> = pool
            .genesis_commands(Amount::from(config.self_bond))
            .into_iter()
            .map(|(domain, caller, command)| {
                let name = command.type_name();
                (name, runner.submit(domain, caller, command))
            })
            .collect();
        runner.run_until(runner.now());
        for (command, request) in requests {
            match runner.result(request) {
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    return Err(SimulatorError::Genesis {
                        command,
                        error: error.clone(),
                    })
                }
                None => return Err(SimulatorError::GenesisUnanswered(command)),
            }
        }
        info!(
            domains = config.num_domains,
            participants = pool.total_participants(),
            "Genesis complete"
        );

        let workload = MixedWorkload::new(
            &config.workload,
            config.refund_delay(),
            config.detach_delay(),
        );
        let rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));
        let fact_cursor = runner.facts().len();

        Ok(Self {
            config,
            runner,
            pool,
            workload,
            rng,
            metrics: MetricsCollector::new()?,
            outstanding: BTreeMap::new(),
            fact_cursor,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    pub fn pool(&self) -> &ParticipantPool {
        &self.pool
    }

    /// Run the workload for `duration` of simulated time, then let in-flight
    /// messages land and report.
    pub fn run_for(&mut self, duration: Duration) -> SimulationReport {
        let start = self.runner.now();
        let end = start + duration;
        let interval = self.config.workload.batch_interval();
        info!(?duration, ?interval, "Starting workload");

        while self.runner.now() < end {
            let now = self.runner.now();
            let batch = self
                .workload
                .generate_batch(&mut self.pool, now, &mut self.rng);
            debug!(time = ?now, commands = batch.len(), "Submitting batch");
            for submission in batch {
                self.metrics.record_submitted(submission.op.name());
                let request =
                    self.runner
                        .submit(submission.domain, submission.caller, submission.command);
                self.outstanding.insert(request, (submission.op, now));
            }
            self.runner.run_until((now + interval).min(end));
            self.collect();
        }

        let drain =
            Duration::from_millis(self.config.network.latency_ms * 10).max(Duration::from_secs(1));
        self.runner.run_for(drain);
        self.collect();

        let stale: usize = domains(&self.config)
            .filter_map(|d| self.runner.domain(d))
            .map(|d| d.stale_operations().len())
            .sum();
        if stale > 0 {
            warn!(stale, "Pending operations past the staleness threshold");
        }

        let report = self.metrics.report(
            self.runner.now() - start,
            self.runner.stats().clone(),
            self.pool.enrolled_count(),
            stale,
        );
        info!(
            accepted = report.totals.accepted,
            rejected = report.totals.rejected,
            in_flight = report.cross_domain_in_flight,
            "Workload finished"
        );
        report
    }

    fn collect(&mut self) {
        let answered: Vec<RequestId> = self
            .outstanding
            .keys()
            .filter(|id| self.runner.result(**id).is_some())
            .copied()
            .collect();
        for request in answered {
            let (Some((op, submitted_at)), Some(result)) = (
                self.outstanding.remove(&request),
                self.runner.result(request).cloned(),
            ) else {
                continue;
            };
            self.metrics.record_result(op.name(), result.is_ok());
            self.on_result(op, submitted_at, result);
        }

        let facts: Vec<RecordedFact> = self.runner.facts()[self.fact_cursor..].to_vec();
        self.fact_cursor += facts.len();
        for fact in facts {
            self.on_fact(fact);
        }
    }

    fn on_result(
        &mut self,
        op: WorkloadOp,
        submitted_at: Duration,
        result: Result<CommandOutcome, ProtocolError>,
    ) {
        match (op, result) {
            (
                WorkloadOp::Delegate {
                    delegator,
                    validator,
                },
                Ok(CommandOutcome::Delegated(id)),
            ) => self.pool.record_delegation(delegator, validator, id),
            (WorkloadOp::Enroll(key), Ok(CommandOutcome::Enrolled)) => {
                self.pool.record_enrolled(key)
            }
            (WorkloadOp::Enroll(key), Err(_)) => self.pool.record_enroll_failed(&key),
            (WorkloadOp::ExecuteDetach(key), Ok(CommandOutcome::Detached)) => {
                self.pool.record_detached(&key)
            }
            (
                WorkloadOp::Enroll(_) | WorkloadOp::InitiateDetach(_) | WorkloadOp::ExecuteDetach(_),
                Ok(CommandOutcome::Pending(correlation)),
            ) => self.metrics.record_pending(correlation, submitted_at),
            (WorkloadOp::InitiateDetach(key), Err(_)) => self.pool.record_detach_abandoned(&key),
            (WorkloadOp::ExecuteDetach(key), Err(e)) if !e.is_retryable() => {
                self.pool.record_detach_abandoned(&key)
            }
            (op, Err(e)) => debug!(operation = op.name(), error = %e, "Command rejected"),
            _ => {}
        }
    }

    fn on_fact(&mut self, recorded: RecordedFact) {
        let RecordedFact { time, domain, fact } = recorded;
        match fact {
            Fact::EnrollmentConfirmed {
                validator,
                service,
                asset,
            } if self.is_origin(validator, domain) => {
                let correlation =
                    CorrelationId::derive(OperationKind::Enroll, validator, service, &asset);
                self.metrics.record_resolved(&correlation, time, true);
                self.pool.record_enrolled((validator, service, asset));
            }
            Fact::EnrollmentFailed {
                validator,
                service,
                asset,
                ..
            } if self.is_origin(validator, domain) => {
                let correlation =
                    CorrelationId::derive(OperationKind::Enroll, validator, service, &asset);
                self.metrics.record_resolved(&correlation, time, false);
                self.pool.record_enroll_failed(&(validator, service, asset));
            }
            Fact::DetachInitiated {
                validator,
                service,
                asset,
                unlock_at: Some(_),
            } if self.is_origin(validator, domain) => {
                let correlation =
                    CorrelationId::derive(OperationKind::Detach, validator, service, &asset);
                self.metrics.record_resolved(&correlation, time, true);
            }
            Fact::DetachCompleted {
                validator,
                service,
                asset,
            } if self.is_origin(validator, domain) => {
                let correlation =
                    CorrelationId::derive(OperationKind::Detach, validator, service, &asset);
                self.metrics.record_resolved(&correlation, time, true);
                self.pool.record_detached(&(validator, service, asset));
            }
            Fact::DetachFailed { correlation, reason } => {
                self.metrics.record_resolved(&correlation, time, false);
                let key = self.pool.detaching().copied().find(|key: &EnrollmentKey| {
                    CorrelationId::derive(OperationKind::Detach, key.0, key.1, &key.2)
                        == correlation
                });
                if let Some(key) = key {
                    debug!(correlation = %correlation, reason = %reason, "Detachment refused");
                    self.pool.record_detach_abandoned(&key);
                }
            }
            _ => {}
        }
    }

    fn is_origin(&self, validator: xstake_types::ValidatorId, domain: DomainId) -> bool {
        self.pool
            .validator(validator)
            .is_some_and(|v| v.origin == domain)
    }
}

fn domains(config: &SimulatorConfig) -> impl Iterator<Item = DomainId> {
    (1..=config.num_domains).map(DomainId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkSettings, WorkloadConfig};
    use tracing_test::traced_test;

    fn small() -> SimulatorConfig {
        SimulatorConfig::new(2, 2)
            .with_delegators_per_domain(10)
            .with_refund_delay(Duration::from_secs(20))
            .with_detach_delay(Duration::from_secs(10))
            .with_workload(WorkloadConfig::default().with_batch_size(8))
    }

    #[traced_test]
    #[test]
    fn test_genesis_registers_everyone() {
        let simulator = Simulator::new(small()).unwrap();
        for domain in [DomainId(1), DomainId(2)] {
            let node = simulator.runner().domain(domain).unwrap();
            assert_eq!(node.directory().len(), 2);
            assert_eq!(node.registry().len(), 2);
        }
    }

    #[traced_test]
    #[test]
    fn test_workload_makes_progress() {
        let mut simulator = Simulator::new(small()).unwrap();
        let report = simulator.run_for(Duration::from_secs(60));

        assert!(report.totals.submitted > 0);
        assert!(report.totals.accepted > 0);
        assert_eq!(
            report.totals.submitted,
            report.totals.accepted + report.totals.rejected
        );
        assert!(report.enrollments > 0);
        assert!(report.cross_domain_completed > 0);
        assert_eq!(report.stats.decode_failures, 0);
    }

    #[test]
    fn test_same_seed_same_report() {
        let run = || {
            let mut simulator = Simulator::new(small().with_seed(9)).unwrap();
            let report = simulator.run_for(Duration::from_secs(30));
            (report.totals, report.by_operation, report.stats)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = small().with_network(NetworkSettings {
            drop_rate: 2.0,
            ..NetworkSettings::default()
        });
        assert!(matches!(
            Simulator::new(config),
            Err(SimulatorError::Config(ConfigError::Invalid { .. }))
        ));
    }
}
