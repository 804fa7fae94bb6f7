//! Core types for xstake: `Event`, `Action`, `Effects`, errors and the
//! `StateMachine` trait, plus the interfaces of the external collaborators
//! (custody, eligibility oracle, proof verification).

mod action;
mod codec;
mod effects;
mod error;
mod event;
mod message;
mod request;
mod traits;

pub use action::{Action, CommandOutcome, Fact};
pub use codec::{decode_message, encode_message, CodecError};
pub use effects::{Effects, Settlement};
pub use error::{CustodyError, ErrorClass, ProtocolError};
pub use event::{Command, Event};
pub use message::CrossDomainMessage;
pub use request::RequestId;
pub use traits::{Custody, EligibilityOracle, MerkleProofVerifier, ProofVerifier, StateMachine};
