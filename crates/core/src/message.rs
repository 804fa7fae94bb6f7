//! Cross-domain message envelope.

use xstake_messages::{
    ClaimRewardConfirmed, ClaimRewardRequest, DetachCompleted, DetachExecute, DetachFailed,
    DetachInitiated, DetachInitiatedConfirmed, EnrollConfirmed, EnrollFailed, EnrollRequest,
    NetworkMessage, SlashNotice,
};
use serde::{Deserialize, Serialize};
use xstake_types::CorrelationId;

/// Messages one domain can send to another.
///
/// The runner hands these to the messaging channel, which delivers each one
/// to the destination domain as `Event::MessageReceived`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDomainMessage {
    // ═══════════════════════════════════════════════════════════════════════
    // Enrollment
    // ═══════════════════════════════════════════════════════════════════════
    Enroll(EnrollRequest),
    EnrollConfirmed(EnrollConfirmed),
    EnrollFailed(EnrollFailed),

    // ═══════════════════════════════════════════════════════════════════════
    // Detachment
    // ═══════════════════════════════════════════════════════════════════════
    DetachInitiated(DetachInitiated),
    DetachInitiatedConfirmed(DetachInitiatedConfirmed),
    DetachExecute(DetachExecute),
    DetachCompleted(DetachCompleted),
    DetachFailed(DetachFailed),

    // ═══════════════════════════════════════════════════════════════════════
    // Slashing & rewards
    // ═══════════════════════════════════════════════════════════════════════
    Slash(SlashNotice),
    ClaimReward(ClaimRewardRequest),
    ClaimRewardConfirmed(ClaimRewardConfirmed),
}

impl CrossDomainMessage {
    /// Get the stable type tag of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            CrossDomainMessage::Enroll(_) => EnrollRequest::message_type_id(),
            CrossDomainMessage::EnrollConfirmed(_) => EnrollConfirmed::message_type_id(),
            CrossDomainMessage::EnrollFailed(_) => EnrollFailed::message_type_id(),
            CrossDomainMessage::DetachInitiated(_) => DetachInitiated::message_type_id(),
            CrossDomainMessage::DetachInitiatedConfirmed(_) => {
                DetachInitiatedConfirmed::message_type_id()
            }
            CrossDomainMessage::DetachExecute(_) => DetachExecute::message_type_id(),
            CrossDomainMessage::DetachCompleted(_) => DetachCompleted::message_type_id(),
            CrossDomainMessage::DetachFailed(_) => DetachFailed::message_type_id(),
            CrossDomainMessage::Slash(_) => SlashNotice::message_type_id(),
            CrossDomainMessage::ClaimReward(_) => ClaimRewardRequest::message_type_id(),
            CrossDomainMessage::ClaimRewardConfirmed(_) => {
                ClaimRewardConfirmed::message_type_id()
            }
        }
    }

    /// Correlation id, for messages that belong to a pending operation.
    pub fn correlation(&self) -> Option<CorrelationId> {
        match self {
            CrossDomainMessage::Enroll(m) => Some(m.correlation),
            CrossDomainMessage::EnrollConfirmed(m) => Some(m.correlation),
            CrossDomainMessage::EnrollFailed(m) => Some(m.correlation),
            CrossDomainMessage::DetachInitiated(m) => Some(m.correlation),
            CrossDomainMessage::DetachInitiatedConfirmed(m) => Some(m.correlation),
            CrossDomainMessage::DetachExecute(m) => Some(m.correlation),
            CrossDomainMessage::DetachCompleted(m) => Some(m.correlation),
            CrossDomainMessage::DetachFailed(m) => Some(m.correlation),
            CrossDomainMessage::Slash(_)
            | CrossDomainMessage::ClaimReward(_)
            | CrossDomainMessage::ClaimRewardConfirmed(_) => None,
        }
    }

    /// Check if this message answers a request (confirmation or failure).
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            CrossDomainMessage::EnrollConfirmed(_)
                | CrossDomainMessage::EnrollFailed(_)
                | CrossDomainMessage::DetachInitiatedConfirmed(_)
                | CrossDomainMessage::DetachCompleted(_)
                | CrossDomainMessage::DetachFailed(_)
                | CrossDomainMessage::ClaimRewardConfirmed(_)
        )
    }
}
