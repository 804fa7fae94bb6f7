//! xstake Simulator CLI
//!
//! Runs a generated workload against in-process domains and prints a report.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xstake_simulator::{Simulator, SimulatorConfig};

#[derive(Parser)]
#[command(name = "xstake-sim")]
#[command(about = "Cross-domain staking workload simulator")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated time to run (e.g., "30s", "5m", "1h")
    #[arg(short, long, default_value = "5m")]
    duration: humantime::Duration,

    /// Number of domains
    #[arg(long)]
    domains: Option<u64>,

    /// Validators per domain
    #[arg(long)]
    validators: Option<usize>,

    /// Commands generated per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Cross-domain enrollment ratio (0.0 to 1.0)
    #[arg(long)]
    cross_domain_ratio: Option<f64>,

    /// Message drop probability
    #[arg(long)]
    drop_rate: Option<f64>,

    /// Message duplication probability
    #[arg(long)]
    duplicate_rate: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(SimulatorConfig, std::time::Duration)> {
        let mut config = match &self.config {
            Some(path) => SimulatorConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimulatorConfig::default(),
        };

        if let Some(domains) = self.domains {
            config.num_domains = domains;
        }
        if let Some(validators) = self.validators {
            config.validators_per_domain = validators;
        }
        if let Some(size) = self.batch_size {
            config.workload.batch_size = size;
        }
        if let Some(ratio) = self.cross_domain_ratio {
            config.workload.cross_domain_ratio = ratio;
        }
        if let Some(rate) = self.drop_rate {
            config.network.drop_rate = rate;
        }
        if let Some(rate) = self.duplicate_rate {
            config.network.duplicate_rate = rate;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;

        Ok((config, *self.duration))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, duration) = Cli::parse().into_config()?;
    let mut simulator = Simulator::new(config).context("setting up simulation")?;

    println!("Running simulation for {:?}...", duration);
    let report = simulator.run_for(duration);
    report.print();

    Ok(())
}
