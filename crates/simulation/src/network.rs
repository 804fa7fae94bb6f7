//! Simulated messaging channel.

use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;
use xstake_types::DomainId;

/// Configuration for the simulated messaging channel.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Base one-way delivery latency.
    pub latency: Duration,

    /// Jitter as a fraction of the base latency (0.1 = ±10%).
    pub jitter_fraction: f64,

    /// Probability that a message is lost.
    pub drop_rate: f64,

    /// Probability that a delivered message is delivered a second time.
    pub duplicate_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(150),
            jitter_fraction: 0.1,
            drop_rate: 0.0,
            duplicate_rate: 0.0,
        }
    }
}

impl NetworkConfig {
    /// Zero-jitter channel with a fixed latency.
    pub fn fixed(latency: Duration) -> Self {
        Self {
            latency,
            jitter_fraction: 0.0,
            ..Default::default()
        }
    }

    /// Set the base latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Set the drop probability.
    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the duplicate probability.
    pub fn with_duplicate_rate(mut self, rate: f64) -> Self {
        self.duplicate_rate = rate.clamp(0.0, 1.0);
        self
    }
}

/// Decides when, and whether, each message arrives.
///
/// All randomness comes from the runner's seeded RNG.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Severed links, stored with the lower domain first.
    partitions: BTreeSet<(DomainId, DomainId)>,
}

impl SimulatedNetwork {
    /// Create a fully connected network.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            partitions: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn link(a: DomainId, b: DomainId) -> (DomainId, DomainId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Sever the link between two domains in both directions.
    pub fn partition(&mut self, a: DomainId, b: DomainId) {
        self.partitions.insert(Self::link(a, b));
    }

    /// Restore the link between two domains.
    pub fn heal(&mut self, a: DomainId, b: DomainId) {
        self.partitions.remove(&Self::link(a, b));
    }

    /// Restore every link.
    pub fn heal_all(&mut self) {
        self.partitions.clear();
    }

    /// Check if two domains are cut off from each other.
    pub fn is_partitioned(&self, a: DomainId, b: DomainId) -> bool {
        self.partitions.contains(&Self::link(a, b))
    }

    /// Delivery delays for one message: empty if it is lost, two entries if
    /// it is duplicated.
    pub fn sample_deliveries(
        &self,
        from: DomainId,
        to: DomainId,
        rng: &mut impl Rng,
    ) -> Vec<Duration> {
        if self.is_partitioned(from, to) {
            return vec![];
        }
        if rng.gen_bool(self.config.drop_rate.clamp(0.0, 1.0)) {
            return vec![];
        }

        let mut delays = vec![self.sample_latency(rng)];
        if rng.gen_bool(self.config.duplicate_rate.clamp(0.0, 1.0)) {
            delays.push(self.sample_latency(rng));
        }
        delays
    }

    fn sample_latency(&self, rng: &mut impl Rng) -> Duration {
        let base = self.config.latency.as_secs_f64();
        let jitter = base * self.config.jitter_fraction.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return self.config.latency;
        }
        let offset = rng.gen_range(-jitter..=jitter);
        Duration::from_secs_f64((base + offset).max(0.0))
    }
}
