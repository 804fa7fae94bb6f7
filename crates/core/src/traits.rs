//! Core traits: the state machine abstraction and external collaborators.

use crate::{Action, CustodyError, Event};
use std::time::Duration;
use xstake_types::{Address, Amount, Asset, DomainId, Hash, MerkleProof};

/// A state machine that processes events.
///
/// Every domain runs one of these. It is:
///
/// - **Synchronous**: No async, no `.await`
/// - **Deterministic**: Same state + event = same actions
/// - **Pure-ish**: Mutates self, but sends nothing itself
///
/// # Example
///
/// ```ignore
/// impl StateMachine for DomainStateMachine {
///     fn handle(&mut self, event: Event) -> Vec<Action> {
///         match event {
///             Event::Command { request_id, caller, command } => {
///                 self.on_command(request_id, caller, command)
///             }
///             Event::MessageReceived { from, message } => self.on_message(from, message),
///         }
///     }
///
///     fn set_time(&mut self, now: Duration) {
///         self.now = now;
///     }
/// }
/// ```
pub trait StateMachine {
    /// Process an event, returning actions to perform.
    ///
    /// # Guarantees
    ///
    /// - **Synchronous**: This method never blocks or awaits
    /// - **Deterministic**: Given the same state and event, always returns the same actions
    /// - **Atomic**: An event is fully applied, or rejected with no state change
    ///
    /// # Returns
    ///
    /// A list of actions for the runner to execute. Actions may include:
    /// - Sending cross-domain messages
    /// - Answering a command
    /// - Emitting protocol facts
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current time.
    ///
    /// Called by the runner before each `handle()` call. All timelocks are
    /// evaluated lazily against this value.
    fn set_time(&mut self, now: Duration);

    /// Get the current time.
    fn now(&self) -> Duration;
}

/// Custody ledger for one domain.
///
/// Debits and credits account balances per asset. Implementations dispatch
/// on the `Asset` tag (native transfer vs token contract) at this boundary
/// only. Every call is atomic: it either applies fully or returns an error
/// with no change.
pub trait Custody {
    /// Move `amount` from `from` into `account`.
    fn transfer_in(
        &mut self,
        account: Address,
        from: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError>;

    /// Move `amount` out of `account` to `to`.
    ///
    /// Fails if `account` does not have `amount` available (balance net of
    /// slashed funds).
    fn transfer_out(
        &mut self,
        account: Address,
        to: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError>;

    /// Mark `amount` of `account`'s balance as slashed.
    ///
    /// Slashed funds stay in custody but are no longer available.
    fn mark_slashed(
        &mut self,
        account: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError>;

    /// Total balance, including slashed funds.
    fn balance(&self, account: &Address, asset: &Asset) -> Amount;

    /// Balance available for transfer.
    fn available(&self, account: &Address, asset: &Asset) -> Amount;
}

/// A service's eligibility policy for enrolling validators.
pub trait EligibilityOracle {
    /// Whether a validator staking `amount` of `token` on `chain` may enroll.
    fn check_eligibility(&self, token: &Asset, chain: DomainId, amount: Amount) -> bool;
}

/// Verifies inclusion proofs against a commitment root.
pub trait ProofVerifier {
    /// Whether `proof` authenticates `leaf` at `index` under `root`.
    fn verify(&self, proof: &MerkleProof, root: &Hash, leaf: &Hash, index: u64) -> bool;
}

/// Binary Blake3 Merkle tree verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct MerkleProofVerifier;

impl ProofVerifier for MerkleProofVerifier {
    fn verify(&self, proof: &MerkleProof, root: &Hash, leaf: &Hash, index: u64) -> bool {
        proof.verify(leaf, root, index)
    }
}
