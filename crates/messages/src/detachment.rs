//! Two-phase detachment messages.

use crate::NetworkMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use xstake_types::{Asset, CorrelationId, ServiceId, ValidatorId};

/// Phase 1: ask the service's domain to start the exit timelock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachInitiated {
    pub correlation: CorrelationId,
    pub service: ServiceId,
    pub validator: ValidatorId,
    pub asset: Asset,
}

impl NetworkMessage for DetachInitiated {
    fn message_type_id() -> &'static str {
        "detach.initiated"
    }
}

/// The timelock has started; carries the remote-computed unlock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachInitiatedConfirmed {
    pub correlation: CorrelationId,
    pub unlock_at: Duration,
}

impl NetworkMessage for DetachInitiatedConfirmed {
    fn message_type_id() -> &'static str {
        "detach.initiated_confirmed"
    }
}

/// Phase 2: ask the service's domain to complete the exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachExecute {
    pub correlation: CorrelationId,
    pub service: ServiceId,
    pub validator: ValidatorId,
    pub asset: Asset,
}

impl NetworkMessage for DetachExecute {
    fn message_type_id() -> &'static str {
        "detach.execute"
    }
}

/// The service's domain removed the enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachCompleted {
    pub correlation: CorrelationId,
    pub service: ServiceId,
    pub validator: ValidatorId,
    pub asset: Asset,
}

impl NetworkMessage for DetachCompleted {
    fn message_type_id() -> &'static str {
        "detach.completed"
    }
}

/// Either phase was rejected by the service's domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachFailed {
    pub correlation: CorrelationId,
    pub reason: String,
}

impl NetworkMessage for DetachFailed {
    fn message_type_id() -> &'static str {
        "detach.failed"
    }
}
