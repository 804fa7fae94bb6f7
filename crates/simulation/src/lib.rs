//! Deterministic simulation runner.
//!
//! This crate provides a fully deterministic environment for running several
//! domains against each other. Given the same seed, it produces identical
//! results every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, SimEvent>)     │ │
//! │  │     Ordered by: time, priority, domain, sequence   │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     domains: DomainStateMachine<SimCustody>        │ │
//! │  │     Each processes events sequentially             │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Actions → encode → SimulatedNetwork → queue    │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Cross-domain messages go through the wire codec on every hop, so a
//! simulated run exercises the same bytes a real channel would carry.

mod custody;
mod event_queue;
mod network;
mod runner;

pub use custody::SimCustody;
pub use event_queue::{EventKey, EventPriority, SimEvent};
pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{RecordedFact, SimulationRunner, SimulationStats};
