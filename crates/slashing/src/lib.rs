//! Slashing ledger.
//!
//! A service penalises a validator by severity tier; the service's policy
//! bounds the basis points it may pick for each tier. The penalty amount is
//! computed once, on the service's domain, from the validator's total stake
//! in the slashed asset. When the validator lives on another domain the
//! fully computed figures travel in a `SLASH` message and the origin applies
//! them as-is.
//!
//! Records are immutable and indexed per validator in arrival order; the
//! delegation ledger reads that order to compute refunds.

mod ledger;

pub use ledger::SlashingLedger;
