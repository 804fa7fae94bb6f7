//! Enrollment and detachment coordinators.
//!
//! A validator's membership in a service, per asset, moves through:
//!
//! ```text
//! Unenrolled ──enroll──► PendingEnrollment ──confirmed──► Enrolled
//!      ▲                        │                            │
//!      └────────failed──────────┘                      initiate_detach
//!      ▲                                                     ▼
//!      └──completed── PendingExecution ◄──execute── PendingDetachment
//! ```
//!
//! When the service lives on the validator's own domain every step runs
//! synchronously. Otherwise each step is a request to the service's domain
//! tracked in a [`PendingOperations`] table until the answer arrives. A
//! failure answer clears the pending entry and leaves membership as it was.
//!
//! [`PendingOperations`]: xstake_pending::PendingOperations

mod detach;
mod enroll;

pub use detach::{DetachmentCoordinator, RemoteDetachment};
pub use enroll::EnrollmentCoordinator;

use std::fmt;

/// Why a service's domain rejected a cross-domain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The service is not registered on the receiving domain.
    InvalidService,
    /// The validator does not meet the service's requirements.
    Ineligible,
    /// The validator is not on the service's roster for the asset.
    NotEnrolled,
    /// The request claims a validator from a different domain than its sender.
    OriginMismatch,
    /// No detachment was initiated for the request.
    NoUnlockTime,
    /// The detachment timelock has not elapsed on the receiving domain.
    TimelockNotElapsed,
}

impl RejectReason {
    /// Reason string carried in failure messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidService => "InvalidAVS",
            RejectReason::Ineligible => "Ineligible",
            RejectReason::NotEnrolled => "NotEnrolled",
            RejectReason::OriginMismatch => "OriginMismatch",
            RejectReason::NoUnlockTime => "NoUnlockTime",
            RejectReason::TimelockNotElapsed => "TimelockNotElapsed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
