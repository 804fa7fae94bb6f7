//! Configuration for pending-operation bookkeeping.

use std::time::Duration;

/// Configuration for pending-operation bookkeeping and backpressure.
#[derive(Debug, Clone)]
pub struct PendingConfig {
    /// Maximum operations in flight per table.
    ///
    /// New operations are rejected with `TooManyPending` when at this limit.
    pub max_pending: usize,

    /// Age after which an unanswered operation is reported as stale.
    pub stale_after: Duration,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            max_pending: 1024,
            stale_after: Duration::from_secs(60 * 60),
        }
    }
}

impl PendingConfig {
    /// Create a new config with a custom pending limit.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            max_pending,
            ..Default::default()
        }
    }

    /// Set the staleness threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }
}
