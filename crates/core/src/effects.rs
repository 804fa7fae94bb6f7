//! Component effects and custody settlements.

use crate::{Action, CommandOutcome, CrossDomainMessage, Custody, CustodyError, Fact};
use xstake_types::{Address, Amount, Asset, DomainId};

/// A custody movement owed once bookkeeping is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Pay out of a protocol-controlled account.
    TransferOut {
        account: Address,
        to: Address,
        asset: Asset,
        amount: Amount,
    },
    /// Mark funds in an account as slashed.
    MarkSlashed {
        account: Address,
        asset: Asset,
        amount: Amount,
    },
}

impl Settlement {
    /// Apply this settlement to a custody ledger.
    pub fn apply<C: Custody + ?Sized>(&self, custody: &mut C) -> Result<(), CustodyError> {
        match *self {
            Settlement::TransferOut {
                account,
                to,
                asset,
                amount,
            } => custody.transfer_out(account, to, asset, amount),
            Settlement::MarkSlashed {
                account,
                asset,
                amount,
            } => custody.mark_slashed(account, asset, amount),
        }
    }
}

/// Everything a component operation produced.
///
/// Components mutate their own bookkeeping and return this value; they never
/// touch custody for outflows themselves. The node applies `settlements`
/// only after the component has returned, so every payout happens against
/// fully updated state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effects {
    /// Result reported to the caller, for command paths.
    pub outcome: CommandOutcome,
    /// Custody movements, applied in order.
    pub settlements: Vec<Settlement>,
    /// Messages and facts for the runner.
    pub actions: Vec<Action>,
}

impl Effects {
    /// Create effects with an outcome and nothing else.
    pub fn new(outcome: CommandOutcome) -> Self {
        Self {
            outcome,
            settlements: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Effects with `CommandOutcome::Done`.
    pub fn done() -> Self {
        Self::new(CommandOutcome::Done)
    }

    /// Queue a settlement.
    pub fn settle(mut self, settlement: Settlement) -> Self {
        self.settlements.push(settlement);
        self
    }

    /// Queue a cross-domain message.
    pub fn send(mut self, destination: DomainId, message: CrossDomainMessage) -> Self {
        self.actions.push(Action::SendMessage {
            destination,
            message,
        });
        self
    }

    /// Queue a fact.
    pub fn emit(mut self, fact: Fact) -> Self {
        self.actions.push(Action::EmitFact(fact));
        self
    }

    /// Append another set of effects, keeping this outcome.
    pub fn merge(&mut self, other: Effects) {
        self.settlements.extend(other.settlements);
        self.actions.extend(other.actions);
    }
}
