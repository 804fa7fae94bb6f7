//! In-memory custody ledger for simulation.

use im::OrdMap;
use xstake_core::{Custody, CustodyError};
use xstake_types::{Address, Amount, Asset};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Balance {
    total: Amount,
    slashed: Amount,
}

impl Balance {
    fn available(&self) -> Amount {
        self.total.saturating_sub(self.slashed)
    }
}

/// Custody ledger backed by a persistent map.
///
/// Cloning is O(1), so a run can keep snapshots of a domain's balances and
/// compare them later.
#[derive(Debug, Clone, Default)]
pub struct SimCustody {
    balances: OrdMap<(Address, Asset), Balance>,
}

impl SimCustody {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account outside the protocol (genesis funding).
    pub fn mint(&mut self, account: Address, asset: Asset, amount: Amount) {
        let key = (account, asset);
        let mut balance = self.balances.get(&key).copied().unwrap_or_default();
        balance.total = balance.total.saturating_add(amount);
        self.balances.insert(key, balance);
    }

    /// Total balance of an account.
    pub fn balance_of(&self, account: Address, asset: Asset) -> Amount {
        self.balance(&account, &asset)
    }

    /// Slashed funds held in an account.
    pub fn slashed_of(&self, account: Address, asset: Asset) -> Amount {
        self.balances
            .get(&(account, asset))
            .map(|b| b.slashed)
            .unwrap_or(0)
    }

    /// Take a snapshot of the ledger.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Sum of all balances in an asset.
    pub fn total_supply(&self, asset: &Asset) -> Amount {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, b)| b.total)
            .fold(0, Amount::saturating_add)
    }

    fn get(&self, account: Address, asset: Asset) -> Balance {
        self.balances
            .get(&(account, asset))
            .copied()
            .unwrap_or_default()
    }

    fn insufficient(
        account: Address,
        asset: Asset,
        requested: Amount,
        balance: Balance,
    ) -> CustodyError {
        CustodyError::InsufficientFunds {
            account,
            asset,
            requested,
            available: balance.available(),
        }
    }
}

impl Custody for SimCustody {
    fn transfer_in(
        &mut self,
        account: Address,
        from: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        self.transfer_out(from, account, asset, amount)
    }

    fn transfer_out(
        &mut self,
        account: Address,
        to: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        let mut source = self.get(account, asset);
        if source.available() < amount {
            return Err(Self::insufficient(account, asset, amount, source));
        }
        source.total -= amount;

        if account == to {
            return Ok(());
        }
        let mut target = self.get(to, asset);
        target.total = target
            .total
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { account: to, asset })?;

        self.balances.insert((account, asset), source);
        self.balances.insert((to, asset), target);
        Ok(())
    }

    fn mark_slashed(
        &mut self,
        account: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        let mut balance = self.get(account, asset);
        if balance.available() < amount {
            return Err(Self::insufficient(account, asset, amount, balance));
        }
        balance.slashed += amount;
        self.balances.insert((account, asset), balance);
        Ok(())
    }

    fn balance(&self, account: &Address, asset: &Asset) -> Amount {
        self.get(*account, *asset).total
    }

    fn available(&self, account: &Address, asset: &Asset) -> Amount {
        self.get(*account, *asset).available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(i: u8) -> Address {
        Address([i; 20])
    }

    #[test]
    fn test_transfer_moves_funds() {
        let mut custody = SimCustody::new();
        custody.mint(account(1), Asset::Native, 100);

        custody
            .transfer_in(account(2), account(1), Asset::Native, 40)
            .unwrap();
        assert_eq!(custody.balance_of(account(1), Asset::Native), 60);
        assert_eq!(custody.balance_of(account(2), Asset::Native), 40);
        assert_eq!(custody.total_supply(&Asset::Native), 100);
    }

    #[test]
    fn test_slashed_funds_are_unavailable() {
        let mut custody = SimCustody::new();
        custody.mint(account(1), Asset::Native, 100);
        custody.mark_slashed(account(1), Asset::Native, 30).unwrap();

        assert_eq!(custody.available(&account(1), &Asset::Native), 70);
        assert!(custody
            .transfer_out(account(1), account(2), Asset::Native, 71)
            .is_err());
        assert_eq!(custody.balance_of(account(1), Asset::Native), 100);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut custody = SimCustody::new();
        custody.mint(account(1), Asset::Native, 100);
        let snapshot = custody.snapshot();

        custody.mint(account(1), Asset::Native, 1);
        assert_eq!(snapshot.balance_of(account(1), Asset::Native), 100);
        assert_eq!(custody.balance_of(account(1), Asset::Native), 101);
    }
}
