//! Pending cross-domain operation bookkeeping.
//!
//! Every cross-domain action is initiated locally and finalized only when the
//! remote domain answers. Until then it lives in a [`PendingOperations`]
//! table keyed by its [`CorrelationId`], a pure function of
//! (kind, validator, service, asset). Answers are matched against that key;
//! an answer with no entry is a replay and is rejected.
//!
//! # Lifecycle
//!
//! ```text
//! open(AwaitingConfirmation) ──confirm──► Timelocked ──execute──► AwaitingCompletion
//!        │                                                            │
//!        └───────────── fail / complete: take() ◄─────────────────────┘
//! ```
//!
//! Nothing here expires. An operation whose answer never arrives stays
//! pending; [`PendingOperations::stale`] reports such operations so they can
//! be surfaced, but resolving them is left to whoever operates the domain.
//!
//! [`CorrelationId`]: xstake_types::CorrelationId

mod config;
mod state;

pub use config::PendingConfig;
pub use state::PendingOperations;
