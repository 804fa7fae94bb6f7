//! Pending-operation table.

use crate::PendingConfig;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use xstake_core::ProtocolError;
use xstake_types::{CorrelationId, OperationKind, PendingOperation};

/// Operations awaiting a confirmation or failure, keyed by correlation id.
#[derive(Debug, Clone)]
pub struct PendingOperations {
    config: PendingConfig,
    operations: BTreeMap<CorrelationId, PendingOperation>,
}

impl PendingOperations {
    /// Create an empty table.
    pub fn new(config: PendingConfig) -> Self {
        Self {
            config,
            operations: BTreeMap::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PendingConfig {
        &self.config
    }

    /// Start tracking an operation.
    ///
    /// Fails if an operation with the same correlation id is already in
    /// flight, or if the table is full.
    pub fn open(&mut self, operation: PendingOperation) -> Result<CorrelationId, ProtocolError> {
        let id = operation.id;
        if self.operations.contains_key(&id) {
            return Err(ProtocolError::OperationAlreadyPending(id));
        }
        if self.operations.len() >= self.config.max_pending {
            warn!(
                limit = self.config.max_pending,
                "Pending operation table full, rejecting"
            );
            return Err(ProtocolError::TooManyPending {
                limit: self.config.max_pending,
            });
        }

        debug!(
            correlation = %id,
            kind = %operation.kind,
            validator = %operation.validator,
            service = %operation.service,
            destination = %operation.destination,
            "Pending operation opened"
        );
        self.operations.insert(id, operation);
        Ok(id)
    }

    /// Get an operation.
    pub fn get(&self, id: &CorrelationId) -> Option<&PendingOperation> {
        self.operations.get(id)
    }

    /// Get an operation of a specific kind.
    pub fn get_kind(&self, id: &CorrelationId, kind: OperationKind) -> Option<&PendingOperation> {
        self.operations.get(id).filter(|op| op.kind == kind)
    }

    /// Get a mutable operation.
    pub fn get_mut(&mut self, id: &CorrelationId) -> Option<&mut PendingOperation> {
        self.operations.get_mut(id)
    }

    /// Stop tracking an operation, returning it.
    pub fn take(&mut self, id: &CorrelationId) -> Option<PendingOperation> {
        let operation = self.operations.remove(id);
        if let Some(op) = &operation {
            debug!(correlation = %id, kind = %op.kind, "Pending operation cleared");
        }
        operation
    }

    /// Check if an operation is tracked.
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.operations.contains_key(id)
    }

    /// Operations older than the configured threshold at `now`.
    pub fn stale(&self, now: Duration) -> Vec<&PendingOperation> {
        self.operations
            .values()
            .filter(|op| now.saturating_sub(op.created_at) >= self.config.stale_after)
            .collect()
    }

    /// Iterate over all operations.
    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.operations.values()
    }

    /// Number of operations in flight.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for PendingOperations {
    fn default() -> Self {
        Self::new(PendingConfig::default())
    }
}
