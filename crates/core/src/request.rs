//! Client request tracking.

/// Opaque identifier for tracking commands through the system.
///
/// The runner maintains a map of `RequestId` -> caller. The state machine
/// answers every `Event::Command` with exactly one
/// `Action::EmitCommandResult` carrying the same id, which keeps response
/// routing out of the synchronous state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Create a new request ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}
