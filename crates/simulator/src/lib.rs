//! xstake Simulator
//!
//! A long-running workload simulator built on top of the simulation framework.
//! Drives many validators, services and delegators across several domains
//! and reports what happened.
//!
//! # Architecture
//!
//! The simulator builds on `xstake-simulation` to provide:
//!
//! - **Participants**: Validators, services and delegators funded at genesis
//! - **Workload Generation**: A weighted mix of delegations, refunds,
//!   enrollments, detachments, slashes and reward flows
//! - **Metrics Collection**: Per-operation outcomes, cross-domain latency
//!   percentiles, stale pending operations
//! - **Configuration**: Builder methods or a TOML file
//!
//! # Example
//!
//! ```ignore
//! use xstake_simulator::{Simulator, SimulatorConfig, WorkloadConfig};
//! use std::time::Duration;
//!
//! // 3 domains with 4 validators each
//! let config = SimulatorConfig::new(3, 4)
//!     .with_workload(WorkloadConfig::default().with_cross_domain_ratio(0.8));
//!
//! let mut simulator = Simulator::new(config)?;
//! let report = simulator.run_for(Duration::from_secs(600));
//!
//! println!("Accepted: {}", report.totals.accepted);
//! println!("P99 latency: {:?}", report.p99_latency);
//! ```

pub mod accounts;
pub mod config;
pub mod metrics;
pub mod runner;
pub mod workload;

pub use accounts::{ParticipantPool, SimService, SimValidator};
pub use config::{ConfigError, NetworkSettings, OperationMix, SimulatorConfig, WorkloadConfig};
pub use metrics::{MetricsCollector, OperationCounts, SimulationReport};
pub use runner::{Simulator, SimulatorError};
pub use workload::{MixedWorkload, Submission, WorkloadGenerator, WorkloadOp};
