//! Cross-domain messages for the validator coordination protocol.
//!
//! Every cross-domain action follows the same shape: the origin sends a
//! request, the destination executes it and answers with a confirmation or a
//! failure. Requests and their answers share a correlation id so the origin
//! can match an answer to its pending operation.

mod detachment;
mod enrollment;
mod rewards;
mod slashing;

pub use detachment::{
    DetachCompleted, DetachExecute, DetachFailed, DetachInitiated, DetachInitiatedConfirmed,
};
pub use enrollment::{EnrollConfirmed, EnrollFailed, EnrollRequest};
pub use rewards::{ClaimRewardConfirmed, ClaimRewardRequest};
pub use slashing::SlashNotice;

/// A message that can cross a domain boundary.
pub trait NetworkMessage {
    /// Stable type tag used for routing and logging.
    fn message_type_id() -> &'static str;
}
