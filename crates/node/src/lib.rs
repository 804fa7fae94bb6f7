//! Domain state machine.
//!
//! This crate composes the directory, delegation, enrollment, detachment,
//! slashing and rewards components into the single state machine that runs
//! on each domain.

mod config;
mod state;

pub use config::DomainConfig;
pub use state::DomainStateMachine;
