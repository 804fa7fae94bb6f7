//! Event ordering for deterministic simulation.

use std::time::Duration;
use xstake_core::{Command, RequestId};
use xstake_types::{Address, DomainId};

/// Processing order of events scheduled for the same instant.
///
/// Deliveries run before commands so that a command submitted at the same
/// time as a message arrives sees the message's effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventPriority {
    Delivery = 0,
    Command = 1,
}

/// Key for ordering events in the simulation queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority
/// 3. Domain (lower id first, for determinism)
/// 4. Sequence (insertion order, for determinism)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    /// When this event fires.
    pub time: Duration,
    pub priority: EventPriority,
    /// Domain that processes the event.
    pub domain: DomainId,
    /// Tie-breaker.
    pub sequence: u64,
}

/// An event waiting in the queue.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// A local account calls into the domain.
    Command {
        request_id: RequestId,
        caller: Address,
        command: Command,
    },
    /// Encoded cross-domain message arriving from another domain.
    Delivery {
        from: DomainId,
        type_id: &'static str,
        payload: Vec<u8>,
    },
}

impl SimEvent {
    /// Queue priority of this event.
    pub fn priority(&self) -> EventPriority {
        match self {
            SimEvent::Command { .. } => EventPriority::Command,
            SimEvent::Delivery { .. } => EventPriority::Delivery,
        }
    }
}
