//! Enrollment request and its answers.

use crate::NetworkMessage;
use serde::{Deserialize, Serialize};
use xstake_types::{Asset, CorrelationId, DomainId, ServiceId, ValidatorDescriptor, ValidatorId};

/// Ask a service's domain to enroll a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollRequest {
    /// Correlation id of the origin's pending enrollment.
    pub correlation: CorrelationId,
    /// Service to enroll with.
    pub service: ServiceId,
    /// Snapshot of the validator.
    pub validator: ValidatorDescriptor,
    /// Domain the answer must be sent to.
    pub reply_to: DomainId,
    /// Origin-assigned sequence number, increasing with every request the
    /// origin sends. The service's domain ignores a request whose sequence
    /// is not newer than the last one it accepted for the same membership.
    pub sequence: u64,
}

impl NetworkMessage for EnrollRequest {
    fn message_type_id() -> &'static str {
        "enroll.request"
    }
}

/// The service's domain enrolled the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollConfirmed {
    pub correlation: CorrelationId,
    pub service: ServiceId,
    pub validator: ValidatorId,
    pub asset: Asset,
}

impl NetworkMessage for EnrollConfirmed {
    fn message_type_id() -> &'static str {
        "enroll.confirmed"
    }
}

/// The service's domain rejected the enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollFailed {
    pub correlation: CorrelationId,
    pub service: ServiceId,
    pub validator: ValidatorId,
    pub asset: Asset,
    /// Human-readable rejection reason.
    pub reason: String,
}

impl NetworkMessage for EnrollFailed {
    fn message_type_id() -> &'static str {
        "enroll.failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xstake_types::test_utils::test_validator_record;
    use xstake_types::OperationKind;

    #[test]
    fn test_request_carries_descriptor() {
        let record = test_validator_record(7, DomainId(0), Asset::Native, 500);
        let request = EnrollRequest {
            correlation: CorrelationId::derive(
                OperationKind::Enroll,
                record.id,
                ServiceId(1),
                &Asset::Native,
            ),
            service: ServiceId(1),
            validator: record.descriptor(Asset::Native),
            reply_to: DomainId(0),
            sequence: 1,
        };

        assert_eq!(request.validator.stake, 500);
        assert_eq!(request.validator.origin, DomainId(0));
    }

    #[test]
    fn test_type_ids_are_distinct() {
        let ids = [
            EnrollRequest::message_type_id(),
            EnrollConfirmed::message_type_id(),
            EnrollFailed::message_type_id(),
        ];
        assert_eq!(
            ids.iter().collect::<std::collections::HashSet<_>>().len(),
            ids.len()
        );
    }
}
