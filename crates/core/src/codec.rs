//! Message encoding and decoding for the messaging channel.
//!
//! # Wire Format
//!
//! Every cross-domain message is bincode-encoded then LZ4-compressed:
//!
//! ```text
//! [LZ4 compressed bincode payload]
//! ```
//!
//! # Type Dispatch
//!
//! The message type travels beside the payload as its `message_type_id`,
//! not inside it. The channel carries the tag as routing metadata.

use crate::CrossDomainMessage;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use xstake_messages::{
    ClaimRewardConfirmed, ClaimRewardRequest, DetachCompleted, DetachExecute, DetachFailed,
    DetachInitiated, DetachInitiatedConfirmed, EnrollConfirmed, EnrollFailed, EnrollRequest,
    NetworkMessage, SlashNotice,
};

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Message too short")]
    MessageTooShort,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decompression error: {0}")]
    Decompress(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serde::encode_to_vec(payload, bincode::config::standard())
        .map_err(|e| CodecError::Encode(e.to_string()))
}

fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (payload, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(payload)
}

/// Encode a message to wire format.
///
/// Encodes the inner payload then LZ4-compresses it. Pair the result with
/// `message.type_name()` when handing it to the channel.
pub fn encode_message(message: &CrossDomainMessage) -> Result<Vec<u8>, CodecError> {
    let bytes = match message {
        CrossDomainMessage::Enroll(m) => encode_payload(m)?,
        CrossDomainMessage::EnrollConfirmed(m) => encode_payload(m)?,
        CrossDomainMessage::EnrollFailed(m) => encode_payload(m)?,
        CrossDomainMessage::DetachInitiated(m) => encode_payload(m)?,
        CrossDomainMessage::DetachInitiatedConfirmed(m) => encode_payload(m)?,
        CrossDomainMessage::DetachExecute(m) => encode_payload(m)?,
        CrossDomainMessage::DetachCompleted(m) => encode_payload(m)?,
        CrossDomainMessage::DetachFailed(m) => encode_payload(m)?,
        CrossDomainMessage::Slash(m) => encode_payload(m)?,
        CrossDomainMessage::ClaimReward(m) => encode_payload(m)?,
        CrossDomainMessage::ClaimRewardConfirmed(m) => encode_payload(m)?,
    };

    Ok(lz4_flex::compress_prepend_size(&bytes))
}

/// Decode a message from wire format based on its type tag.
///
/// LZ4-decompresses then decodes the payload the tag names.
pub fn decode_message(type_id: &str, data: &[u8]) -> Result<CrossDomainMessage, CodecError> {
    if data.is_empty() {
        return Err(CodecError::MessageTooShort);
    }

    let payload = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| CodecError::Decompress(e.to_string()))?;

    let message = match type_id {
        t if t == EnrollRequest::message_type_id() => {
            CrossDomainMessage::Enroll(decode_payload(&payload)?)
        }
        t if t == EnrollConfirmed::message_type_id() => {
            CrossDomainMessage::EnrollConfirmed(decode_payload(&payload)?)
        }
        t if t == EnrollFailed::message_type_id() => {
            CrossDomainMessage::EnrollFailed(decode_payload(&payload)?)
        }
        t if t == DetachInitiated::message_type_id() => {
            CrossDomainMessage::DetachInitiated(decode_payload(&payload)?)
        }
        t if t == DetachInitiatedConfirmed::message_type_id() => {
            CrossDomainMessage::DetachInitiatedConfirmed(decode_payload(&payload)?)
        }
        t if t == DetachExecute::message_type_id() => {
            CrossDomainMessage::DetachExecute(decode_payload(&payload)?)
        }
        t if t == DetachCompleted::message_type_id() => {
            CrossDomainMessage::DetachCompleted(decode_payload(&payload)?)
        }
        t if t == DetachFailed::message_type_id() => {
            CrossDomainMessage::DetachFailed(decode_payload(&payload)?)
        }
        t if t == SlashNotice::message_type_id() => {
            CrossDomainMessage::Slash(decode_payload(&payload)?)
        }
        t if t == ClaimRewardRequest::message_type_id() => {
            CrossDomainMessage::ClaimReward(decode_payload(&payload)?)
        }
        t if t == ClaimRewardConfirmed::message_type_id() => {
            CrossDomainMessage::ClaimRewardConfirmed(decode_payload(&payload)?)
        }
        other => return Err(CodecError::UnknownType(other.to_string())),
    };

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use xstake_types::test_utils::{test_address, test_token};
    use xstake_types::{Asset, Bips, CorrelationId, OperationKind, ServiceId, SlashId, ValidatorId};

    fn slash_notice() -> SlashNotice {
        SlashNotice {
            slash_id: SlashId::derive(ValidatorId(3), ServiceId(9), Duration::from_secs(5)),
            service: ServiceId(9),
            validator: ValidatorId(3),
            asset: test_token(1),
            amount: 100,
            bips: Bips::new(1_000).unwrap(),
            timestamp: Duration::from_secs(5),
            reason: "double sign".to_string(),
        }
    }

    #[test]
    fn test_encode_decode_slash() {
        let message = CrossDomainMessage::Slash(slash_notice());

        let bytes = encode_message(&message).unwrap();
        assert!(!bytes.is_empty());

        let decoded = decode_message(message.type_name(), &bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_encode_decode_detach_failed() {
        let correlation = CorrelationId::derive(
            OperationKind::Detach,
            ValidatorId(1),
            ServiceId(2),
            &Asset::Native,
        );
        let message = CrossDomainMessage::DetachFailed(DetachFailed {
            correlation,
            reason: "NotEnrolled".to_string(),
        });

        let bytes = encode_message(&message).unwrap();
        let decoded = decode_message("detach.failed", &bytes).unwrap();
        assert_eq!(decoded.correlation(), Some(correlation));
    }

    #[test]
    fn test_encode_decode_claim_reward() {
        let message = CrossDomainMessage::ClaimReward(ClaimRewardRequest {
            validator: ValidatorId(4),
            recipient: test_address(4),
            delegator_share: Bips::new(9_000).unwrap(),
            assets: vec![Asset::Native, test_token(2)],
            nonce: 3,
        });

        let bytes = encode_message(&message).unwrap();
        assert_eq!(decode_message("rewards.claim", &bytes).unwrap(), message);
    }

    #[test]
    fn test_empty_data() {
        let result = decode_message("slash.notice", &[]);
        assert!(matches!(result, Err(CodecError::MessageTooShort)));
    }

    #[test]
    fn test_invalid_compressed_data() {
        // Declares 4 bytes, then a literal-run token with no literal bytes.
        let bytes = vec![4, 0, 0, 0, 0xF0];
        let result = decode_message("slash.notice", &bytes);
        assert!(matches!(result, Err(CodecError::Decompress(_))));
    }

    #[test]
    fn test_unknown_type() {
        let bytes = encode_message(&CrossDomainMessage::Slash(slash_notice())).unwrap();
        let result = decode_message("unknown.type", &bytes);
        assert!(matches!(result, Err(CodecError::UnknownType(_))));
    }
}
