//! Slash notice.

use crate::NetworkMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use xstake_types::{Amount, Asset, Bips, ServiceId, SlashId, ValidatorId};

/// A fully computed penalty, applied verbatim by the validator's domain.
///
/// The destination never recomputes the penalty from severity; the issuing
/// service's figures are the single source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashNotice {
    pub slash_id: SlashId,
    pub service: ServiceId,
    pub validator: ValidatorId,
    pub asset: Asset,
    pub amount: Amount,
    pub bips: Bips,
    pub timestamp: Duration,
    pub reason: String,
}

impl NetworkMessage for SlashNotice {
    fn message_type_id() -> &'static str {
        "slash.notice"
    }
}
