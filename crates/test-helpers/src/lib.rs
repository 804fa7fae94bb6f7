//! Test helpers for xstake.
//!
//! Provides an in-memory [`TestCustody`] ledger and fixtures shared by the
//! component crates' unit tests.

use std::collections::BTreeMap;
use std::time::Duration;
use xstake_core::{Custody, CustodyError};
use xstake_types::{
    Address, Amount, Asset, Bips, BipsRange, ServiceId, Severity, SlashId, SlashPolicy,
    SlashRecord, ValidatorId,
};

pub use xstake_types::test_utils::{test_address, test_token, test_validator_record};

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

/// In-memory custody ledger.
///
/// Accounts start empty; fund them with [`TestCustody::mint`]. Set
/// [`TestCustody::fail_transfers_out`] to make every payout fail.
#[derive(Debug, Clone, Default)]
pub struct TestCustody {
    balances: BTreeMap<(Address, Asset), Balance>,
    /// When set, `transfer_out` always fails.
    pub fail_transfers_out: bool,
}

impl TestCustody {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air.
    pub fn mint(&mut self, account: Address, asset: Asset, amount: Amount) {
        self.balances.entry((account, asset)).or_default().total += amount;
    }

    /// Total balance of an account.
    pub fn balance_of(&self, account: Address, asset: Asset) -> Amount {
        self.balance(&account, &asset)
    }

    /// Slashed amount held in an account.
    pub fn slashed_of(&self, account: Address, asset: Asset) -> Amount {
        self.balances
            .get(&(account, asset))
            .map(|b| b.slashed)
            .unwrap_or(0)
    }

    fn debit(&mut self, account: Address, asset: Asset, amount: Amount) -> Result<(), CustodyError> {
        let balance = self.balances.entry((account, asset)).or_default();
        if balance.available() < amount {
            return Err(CustodyError::InsufficientFunds {
                account,
                asset,
                requested: amount,
                available: balance.available(),
            });
        }
        balance.total -= amount;
        Ok(())
    }

    fn credit(&mut self, account: Address, asset: Asset, amount: Amount) -> Result<(), CustodyError> {
        let balance = self.balances.entry((account, asset)).or_default();
        balance.total = balance
            .total
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { account, asset })?;
        Ok(())
    }
}

impl Custody for TestCustody {
    fn transfer_in(
        &mut self,
        account: Address,
        from: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        self.debit(from, asset, amount)?;
        self.credit(account, asset, amount)
    }

    fn transfer_out(
        &mut self,
        account: Address,
        to: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        if self.fail_transfers_out {
            return Err(CustodyError::InsufficientFunds {
                account,
                asset,
                requested: amount,
                available: 0,
            });
        }
        self.debit(account, asset, amount)?;
        self.credit(to, asset, amount)
    }

    fn mark_slashed(
        &mut self,
        account: Address,
        asset: Asset,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        let balance = self.balances.entry((account, asset)).or_default();
        if balance.available() < amount {
            return Err(CustodyError::InsufficientFunds {
                account,
                asset,
                requested: amount,
                available: balance.available(),
            });
        }
        balance.slashed += amount;
        Ok(())
    }

    fn balance(&self, account: &Address, asset: &Asset) -> Amount {
        self.balances
            .get(&(*account, *asset))
            .map(|b| b.total)
            .unwrap_or(0)
    }

    fn available(&self, account: &Address, asset: &Asset) -> Amount {
        self.balances
            .get(&(*account, *asset))
            .map(|b| b.available())
            .unwrap_or(0)
    }
}

/// Basis points from a raw value known to be in range.
pub fn bips(value: u16) -> Bips {
    Bips::saturating(value)
}

/// Slash policy with explicit tier bounds.
pub fn slash_policy(soft: (u16, u16), hard: (u16, u16)) -> SlashPolicy {
    SlashPolicy {
        soft: BipsRange::new(bips(soft.0), bips(soft.1)),
        hard: BipsRange::new(bips(hard.0), bips(hard.1)),
    }
}

/// A slash record at `timestamp` seconds.
pub fn slash_record(
    validator: ValidatorId,
    service: ServiceId,
    asset: Asset,
    bips_value: u16,
    timestamp_secs: u64,
) -> SlashRecord {
    let timestamp = Duration::from_secs(timestamp_secs);
    SlashRecord {
        id: SlashId::derive(validator, service, timestamp),
        validator,
        service,
        asset,
        bips: bips(bips_value),
        amount: 0,
        timestamp,
        reason: format!("{} offence", Severity::Hard),
    }
}
