//! Delegation ledger.
//!
//! Delegators stake with a single validator per domain. Withdrawal is split
//! in two: [`DelegationLedger::initiate_refund`] does the accounting and
//! freezes the slash-adjusted amount, [`DelegationLedger::refund`] pays it
//! out once the refund delay has elapsed.
//!
//! # Slash adjustment
//!
//! Starting from the principal, every slash of the validator in the same
//! asset whose timestamp lies strictly between the delegation's creation and
//! the refund initiation reduces the running amount by its basis points, in
//! arrival order. Deductions compound: each applies to what the previous
//! ones left.

mod ledger;

pub use ledger::{slash_adjusted_amount, DelegationLedger};
