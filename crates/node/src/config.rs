//! Configuration for a domain.

use std::time::Duration;
use xstake_pending::PendingConfig;
use xstake_types::{Address, DomainId};

/// Default delay between refund initiation and payout.
pub const DEFAULT_REFUND_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default delay between detachment initiation and execution.
pub const DEFAULT_DETACH_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for one domain's state machine.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    /// This domain's identity.
    pub domain: DomainId,

    /// Delay between `initiate_refund` and `refund`.
    pub refund_delay: Duration,

    /// Delay between detachment initiation and execution, enforced on the
    /// service's domain.
    pub detach_delay: Duration,

    /// Account holding submitted rewards until payout.
    pub rewards_vault: Address,

    /// Account allowed to publish distribution commitment roots.
    pub distribution_manager: Address,

    /// Limits for pending cross-domain operations.
    pub pending: PendingConfig,
}

impl DomainConfig {
    /// Create a config with default delays and accounts derived from the
    /// domain id.
    pub fn new(domain: DomainId) -> Self {
        Self {
            domain,
            refund_delay: DEFAULT_REFUND_DELAY,
            detach_delay: DEFAULT_DETACH_DELAY,
            rewards_vault: Address::from_seed(
                &[b"rewards-vault".as_slice(), &domain.0.to_le_bytes()].concat(),
            ),
            distribution_manager: Address::from_seed(
                &[b"distribution-manager".as_slice(), &domain.0.to_le_bytes()].concat(),
            ),
            pending: PendingConfig::default(),
        }
    }

    /// Set the refund delay.
    pub fn with_refund_delay(mut self, refund_delay: Duration) -> Self {
        self.refund_delay = refund_delay;
        self
    }

    /// Set the detachment delay.
    pub fn with_detach_delay(mut self, detach_delay: Duration) -> Self {
        self.detach_delay = detach_delay;
        self
    }

    /// Set the rewards vault account.
    pub fn with_rewards_vault(mut self, rewards_vault: Address) -> Self {
        self.rewards_vault = rewards_vault;
        self
    }

    /// Set the distribution manager account.
    pub fn with_distribution_manager(mut self, distribution_manager: Address) -> Self {
        self.distribution_manager = distribution_manager;
        self
    }

    /// Set the pending operation limits.
    pub fn with_pending(mut self, pending: PendingConfig) -> Self {
        self.pending = pending;
        self
    }
}
