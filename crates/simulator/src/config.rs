//! Configuration types for the simulator.
//!
//! A [`SimulatorConfig`] is built in code with the `with_*` methods or loaded
//! from TOML. Durations in TOML are whole seconds or milliseconds, named by
//! suffix:
//!
//! ```toml
//! num_domains = 3
//! validators_per_domain = 4
//! refund_delay_secs = 3600
//!
//! [network]
//! latency_ms = 150
//! duplicate_rate = 0.05
//!
//! [workload]
//! batch_size = 20
//! cross_domain_ratio = 0.5
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use xstake_simulation::NetworkConfig;

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} is not in [0, 1]")))
    }
}

/// Configuration for a simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Number of domains.
    pub num_domains: u64,

    /// Validators registered on each domain.
    pub validators_per_domain: usize,

    /// Services hosted on each domain.
    pub services_per_domain: usize,

    /// Delegator accounts funded on each domain.
    pub delegators_per_domain: usize,

    /// Genesis balance of every funded account, per asset.
    pub initial_balance: u64,

    /// Stake each validator self-bonds at genesis.
    pub self_bond: u64,

    /// Refund timelock.
    pub refund_delay_secs: u64,

    /// Detachment timelock.
    pub detach_delay_secs: u64,

    /// Messaging channel behaviour.
    pub network: NetworkSettings,

    /// Workload configuration.
    pub workload: WorkloadConfig,

    /// Random seed for deterministic simulation.
    pub seed: u64,
}

impl SimulatorConfig {
    /// Create a configuration with `num_domains` domains and
    /// `validators_per_domain` validators on each.
    pub fn new(num_domains: u64, validators_per_domain: usize) -> Self {
        Self {
            num_domains,
            validators_per_domain,
            services_per_domain: 2,
            delegators_per_domain: 50,
            initial_balance: 1_000_000,
            self_bond: 100_000,
            refund_delay_secs: 60 * 60,
            detach_delay_secs: 10 * 60,
            network: NetworkSettings::default(),
            workload: WorkloadConfig::default(),
            seed: 12345,
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject configurations the simulator cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_domains == 0 {
            return Err(invalid("num_domains", "at least one domain is required"));
        }
        if self.validators_per_domain == 0 {
            return Err(invalid("validators_per_domain", "must be nonzero"));
        }
        if self.services_per_domain == 0 {
            return Err(invalid("services_per_domain", "must be nonzero"));
        }
        if self.self_bond == 0 || self.self_bond > self.initial_balance {
            return Err(invalid(
                "self_bond",
                "must be nonzero and at most initial_balance",
            ));
        }
        check_probability("network.jitter", self.network.jitter)?;
        check_probability("network.drop_rate", self.network.drop_rate)?;
        check_probability("network.duplicate_rate", self.network.duplicate_rate)?;
        check_probability("workload.cross_domain_ratio", self.workload.cross_domain_ratio)?;
        if self.workload.batch_interval_ms == 0 {
            return Err(invalid("workload.batch_interval_ms", "must be nonzero"));
        }
        if self.workload.mix.total() == 0 {
            return Err(invalid("workload.mix", "at least one weight must be nonzero"));
        }
        Ok(())
    }

    /// Set the number of delegators per domain.
    pub fn with_delegators_per_domain(mut self, delegators: usize) -> Self {
        self.delegators_per_domain = delegators;
        self
    }

    /// Set the number of services per domain.
    pub fn with_services_per_domain(mut self, services: usize) -> Self {
        self.services_per_domain = services;
        self
    }

    /// Set the refund timelock.
    pub fn with_refund_delay(mut self, delay: Duration) -> Self {
        self.refund_delay_secs = delay.as_secs();
        self
    }

    /// Set the detachment timelock.
    pub fn with_detach_delay(mut self, delay: Duration) -> Self {
        self.detach_delay_secs = delay.as_secs();
        self
    }

    /// Set the network settings.
    pub fn with_network(mut self, network: NetworkSettings) -> Self {
        self.network = network;
        self
    }

    /// Set the workload configuration.
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn refund_delay(&self) -> Duration {
        Duration::from_secs(self.refund_delay_secs)
    }

    pub fn detach_delay(&self) -> Duration {
        Duration::from_secs(self.detach_delay_secs)
    }

    /// Total number of validators across all domains.
    pub fn total_validators(&self) -> usize {
        self.num_domains as usize * self.validators_per_domain
    }

    /// Convert to a NetworkConfig for the underlying simulation.
    pub fn to_network_config(&self) -> NetworkConfig {
        NetworkConfig::fixed(Duration::from_millis(self.network.latency_ms))
            .with_jitter(self.network.jitter)
            .with_drop_rate(self.network.drop_rate)
            .with_duplicate_rate(self.network.duplicate_rate)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::new(3, 4)
    }
}

/// Messaging channel settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    /// Base one-way latency.
    pub latency_ms: u64,
    /// Jitter as a fraction of the latency.
    pub jitter: f64,
    /// Probability a message is lost.
    pub drop_rate: f64,
    /// Probability a message is delivered twice.
    pub duplicate_rate: f64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            latency_ms: 150,
            jitter: 0.1,
            drop_rate: 0.0,
            duplicate_rate: 0.0,
        }
    }
}

/// Relative weights of the operations the workload issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationMix {
    pub delegate: u32,
    pub refund: u32,
    pub enroll: u32,
    pub detach: u32,
    pub slash: u32,
    pub reward: u32,
    pub claim: u32,
}

impl OperationMix {
    /// Sum of all weights.
    pub fn total(&self) -> u32 {
        self.delegate + self.refund + self.enroll + self.detach + self.slash + self.reward + self.claim
    }
}

impl Default for OperationMix {
    fn default() -> Self {
        Self {
            delegate: 30,
            refund: 10,
            enroll: 20,
            detach: 5,
            slash: 5,
            reward: 20,
            claim: 10,
        }
    }
}

/// Workload configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadConfig {
    /// Number of commands to generate per batch.
    pub batch_size: usize,

    /// Time between batches (simulated time).
    pub batch_interval_ms: u64,

    /// Ratio of enrollments with a service on another domain.
    /// 1.0 = all cross-domain, 0.0 = all local.
    pub cross_domain_ratio: f64,

    /// Operation weights.
    pub mix: OperationMix,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_interval_ms: 1_000,
            cross_domain_ratio: 0.5,
            mix: OperationMix::default(),
        }
    }
}

impl WorkloadConfig {
    /// Set the cross-domain ratio.
    pub fn with_cross_domain_ratio(mut self, ratio: f64) -> Self {
        self.cross_domain_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the batch interval.
    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the operation weights.
    pub fn with_mix(mut self, mix: OperationMix) -> Self {
        self.mix = mix;
        self
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }
}
