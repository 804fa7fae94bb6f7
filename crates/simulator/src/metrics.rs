//! Metrics collection and the end-of-run report.

use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::time::Duration;
use xstake_simulation::SimulationStats;
use xstake_types::CorrelationId;

/// Longest cross-domain latency the histogram tracks exactly; longer ones
/// are clamped to it.
const MAX_TRACKED_LATENCY: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-operation command counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub submitted: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Collects command outcomes and cross-domain completion latency.
pub struct MetricsCollector {
    by_operation: BTreeMap<&'static str, OperationCounts>,
    in_flight: BTreeMap<CorrelationId, Duration>,
    completed: u64,
    failed: u64,
    /// Cross-domain completion latency in microseconds.
    latency: Histogram<u64>,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, hdrhistogram::CreationError> {
        Ok(Self {
            by_operation: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            completed: 0,
            failed: 0,
            latency: Histogram::new_with_bounds(
                1,
                MAX_TRACKED_LATENCY.as_micros() as u64,
                3,
            )?,
        })
    }

    pub fn record_submitted(&mut self, operation: &'static str) {
        self.by_operation.entry(operation).or_default().submitted += 1;
    }

    pub fn record_result(&mut self, operation: &'static str, accepted: bool) {
        let counts = self.by_operation.entry(operation).or_default();
        if accepted {
            counts.accepted += 1;
        } else {
            counts.rejected += 1;
        }
    }

    /// A cross-domain operation started at `now`.
    pub fn record_pending(&mut self, correlation: CorrelationId, now: Duration) {
        self.in_flight.entry(correlation).or_insert(now);
    }

    /// A cross-domain operation was answered at `now`.
    pub fn record_resolved(&mut self, correlation: &CorrelationId, now: Duration, success: bool) {
        let Some(started) = self.in_flight.remove(correlation) else {
            return;
        };
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        let micros = now.saturating_sub(started).as_micros() as u64;
        self.latency.saturating_record(micros.max(1));
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn percentile(&self, quantile: f64) -> Duration {
        if self.latency.is_empty() {
            return Duration::ZERO;
        }
        Duration::from_micros(self.latency.value_at_quantile(quantile))
    }

    /// Build the report for a run that lasted `duration`.
    pub fn report(
        &self,
        duration: Duration,
        stats: SimulationStats,
        enrollments: usize,
        stale_operations: usize,
    ) -> SimulationReport {
        let totals = self
            .by_operation
            .values()
            .fold(OperationCounts::default(), |acc, c| OperationCounts {
                submitted: acc.submitted + c.submitted,
                accepted: acc.accepted + c.accepted,
                rejected: acc.rejected + c.rejected,
            });
        SimulationReport {
            duration,
            totals,
            by_operation: self.by_operation.clone(),
            cross_domain_completed: self.completed,
            cross_domain_failed: self.failed,
            cross_domain_in_flight: self.in_flight.len(),
            p50_latency: self.percentile(0.5),
            p90_latency: self.percentile(0.9),
            p99_latency: self.percentile(0.99),
            max_latency: if self.latency.is_empty() {
                Duration::ZERO
            } else {
                Duration::from_micros(self.latency.max())
            },
            enrollments,
            stale_operations,
            stats,
        }
    }
}

/// Summary of a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    /// Simulated time covered by the run.
    pub duration: Duration,
    pub totals: OperationCounts,
    pub by_operation: BTreeMap<&'static str, OperationCounts>,
    /// Cross-domain enrollments and detachments that were confirmed.
    pub cross_domain_completed: u64,
    /// Cross-domain enrollments and detachments that were refused.
    pub cross_domain_failed: u64,
    /// Cross-domain operations still waiting for an answer.
    pub cross_domain_in_flight: usize,
    pub p50_latency: Duration,
    pub p90_latency: Duration,
    pub p99_latency: Duration,
    pub max_latency: Duration,
    /// Enrollments in effect at the end of the run.
    pub enrollments: usize,
    /// Pending operations past the staleness threshold at the end of the run.
    pub stale_operations: usize,
    pub stats: SimulationStats,
}

impl SimulationReport {
    /// Accepted commands per simulated second.
    pub fn commands_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.totals.accepted as f64 / secs
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!("=== Simulation Report ===");
        println!("Duration:            {:?}", self.duration);
        println!(
            "Commands:            {} submitted, {} accepted, {} rejected ({:.2}/s)",
            self.totals.submitted,
            self.totals.accepted,
            self.totals.rejected,
            self.commands_per_second()
        );
        for (operation, counts) in &self.by_operation {
            println!(
                "  {:<18} {:>8} {:>8} {:>8}",
                operation, counts.submitted, counts.accepted, counts.rejected
            );
        }
        println!(
            "Cross-domain:        {} completed, {} failed, {} in flight",
            self.cross_domain_completed, self.cross_domain_failed, self.cross_domain_in_flight
        );
        println!(
            "Latency:             p50 {:?}, p90 {:?}, p99 {:?}, max {:?}",
            self.p50_latency, self.p90_latency, self.p99_latency, self.max_latency
        );
        println!("Enrollments:         {}", self.enrollments);
        println!("Stale operations:    {}", self.stale_operations);
        println!(
            "Messages:            {} sent, {} delivered, {} dropped, {} duplicated",
            self.stats.messages_sent,
            self.stats.messages_delivered,
            self.stats.messages_dropped,
            self.stats.messages_duplicated
        );
        println!(
            "Failures:            {} undecodable, {} refused settlements",
            self.stats.decode_failures, self.stats.settlement_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xstake_types::Hash;

    #[test]
    fn test_latency_from_pending_to_resolved() {
        let mut metrics = MetricsCollector::new().unwrap();
        let correlation = CorrelationId(Hash::from_bytes(b"op"));
        metrics.record_pending(correlation, Duration::from_millis(100));
        metrics.record_resolved(&correlation, Duration::from_millis(400), true);
        // Unknown correlations are ignored.
        metrics.record_resolved(&correlation, Duration::from_millis(900), true);

        let report = metrics.report(Duration::from_secs(1), SimulationStats::default(), 0, 0);
        assert_eq!(report.cross_domain_completed, 1);
        assert_eq!(report.cross_domain_in_flight, 0);
        let p50 = report.p50_latency.as_millis();
        assert!((299..=301).contains(&p50), "p50 was {p50}ms");
    }

    #[test]
    fn test_latency_spread_is_preserved() {
        let mut metrics = MetricsCollector::new().unwrap();
        for (i, millis) in [5u64, 50, 500, 5_000].into_iter().enumerate() {
            let correlation = CorrelationId(Hash::from_bytes(&[i as u8]));
            metrics.record_pending(correlation, Duration::ZERO);
            metrics.record_resolved(&correlation, Duration::from_millis(millis), true);
        }
        // Beyond the tracked range: clamped, not dropped.
        let correlation = CorrelationId(Hash::from_bytes(b"slow"));
        metrics.record_pending(correlation, Duration::ZERO);
        metrics.record_resolved(&correlation, MAX_TRACKED_LATENCY * 2, false);

        let report = metrics.report(Duration::from_secs(1), SimulationStats::default(), 0, 0);
        assert_eq!(report.cross_domain_completed, 4);
        assert_eq!(report.cross_domain_failed, 1);
        let p50 = report.p50_latency.as_millis();
        assert!((499..=501).contains(&p50), "p50 was {p50}ms");
        let max = report.max_latency.as_secs();
        assert!(max >= MAX_TRACKED_LATENCY.as_secs() - 60, "max was {max}s");
    }

    #[test]
    fn test_totals_sum_operations() {
        let mut metrics = MetricsCollector::new().unwrap();
        metrics.record_submitted("delegate");
        metrics.record_submitted("delegate");
        metrics.record_submitted("slash");
        metrics.record_result("delegate", true);
        metrics.record_result("delegate", false);
        metrics.record_result("slash", true);

        let report = metrics.report(Duration::from_secs(2), SimulationStats::default(), 0, 0);
        assert_eq!(
            report.totals,
            OperationCounts {
                submitted: 3,
                accepted: 2,
                rejected: 1,
            }
        );
        assert_eq!(report.commands_per_second(), 1.0);
    }
}
