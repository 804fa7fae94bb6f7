//! Pending cross-domain operations.

use crate::{Asset, CorrelationId, DomainId, Hash, ServiceId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of cross-domain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Enroll,
    Detach,
}

impl OperationKind {
    /// Tag used in correlation id derivation.
    pub fn tag(&self) -> &'static [u8] {
        match self {
            OperationKind::Enroll => b"op.enroll",
            OperationKind::Detach => b"op.detach",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Enroll => write!(f, "enroll"),
            OperationKind::Detach => write!(f, "detach"),
        }
    }
}

impl CorrelationId {
    /// Derive the correlation id of an operation.
    pub fn derive(
        kind: OperationKind,
        validator: ValidatorId,
        service: ServiceId,
        asset: &Asset,
    ) -> Self {
        Self(Hash::from_parts(&[
            kind.tag(),
            &validator.0.to_le_bytes(),
            &service.0.to_le_bytes(),
            &asset.id_bytes(),
        ]))
    }
}

/// Where a pending operation sits between initiation and finalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingPhase {
    /// Initiation sent, waiting for the remote's confirmation or failure.
    AwaitingConfirmation,
    /// Confirmed and waiting for the unlock time (detachment).
    Timelocked,
    /// Execution sent, waiting for completion or failure (detachment).
    AwaitingCompletion,
}

/// An operation awaiting a confirmation or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Correlation id.
    pub id: CorrelationId,
    /// Operation kind.
    pub kind: OperationKind,
    /// Validator the operation concerns.
    pub validator: ValidatorId,
    /// Service the operation concerns.
    pub service: ServiceId,
    /// Asset the operation concerns.
    pub asset: Asset,
    /// Domain that initiated the operation.
    pub origin: DomainId,
    /// Domain that executes it.
    pub destination: DomainId,
    /// Creation time.
    pub created_at: Duration,
    /// Current phase.
    pub phase: PendingPhase,
    /// Unlock time for detachments, once known.
    pub unlock_at: Option<Duration>,
}

impl PendingOperation {
    /// Create an operation awaiting confirmation.
    pub fn new(
        kind: OperationKind,
        validator: ValidatorId,
        service: ServiceId,
        asset: Asset,
        origin: DomainId,
        destination: DomainId,
        created_at: Duration,
    ) -> Self {
        Self {
            id: CorrelationId::derive(kind, validator, service, &asset),
            kind,
            validator,
            service,
            asset,
            origin,
            destination,
            created_at,
            phase: PendingPhase::AwaitingConfirmation,
            unlock_at: None,
        }
    }

    /// Whether origin and destination differ.
    pub fn is_cross_domain(&self) -> bool {
        self.origin != self.destination
    }
}
