//! Delegation records, indexes and refund flow.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};
use xstake_core::{CommandOutcome, Custody, Effects, Fact, ProtocolError, Settlement};
use xstake_directory::ValidatorDirectory;
use xstake_types::{
    Address, Amount, Asset, DelegationId, DelegationRecord, DelegationStatus, DelegatorState,
    SlashRecord, ValidatorId,
};

/// Compute the refundable amount of a delegation.
///
/// `slashes` must yield the validator's slash records in arrival order.
/// Records for other assets, and records outside the open interval
/// `(created_at, initiated_at)`, are skipped.
pub fn slash_adjusted_amount<'a>(
    principal: Amount,
    asset: &Asset,
    created_at: Duration,
    initiated_at: Duration,
    slashes: impl IntoIterator<Item = &'a SlashRecord>,
) -> Amount {
    slashes
        .into_iter()
        .filter(|s| s.asset == *asset && created_at < s.timestamp && s.timestamp < initiated_at)
        .fold(principal, |effective, slash| {
            effective - slash.bips.apply(effective)
        })
}

/// Every delegation on one domain, indexed by validator and by delegator.
#[derive(Debug, Clone)]
pub struct DelegationLedger {
    refund_delay: Duration,
    delegations: BTreeMap<DelegationId, DelegationRecord>,
    by_validator: BTreeMap<ValidatorId, BTreeSet<DelegationId>>,
    delegators: BTreeMap<Address, DelegatorState>,
}

impl DelegationLedger {
    /// Create an empty ledger.
    pub fn new(refund_delay: Duration) -> Self {
        Self {
            refund_delay,
            delegations: BTreeMap::new(),
            by_validator: BTreeMap::new(),
            delegators: BTreeMap::new(),
        }
    }

    /// Delay between refund initiation and payout.
    pub fn refund_delay(&self) -> Duration {
        self.refund_delay
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Delegate `amount` of `asset` from `caller` to `validator`.
    ///
    /// Funds move into the validator's custody account before any record is
    /// written; if custody refuses, nothing changes.
    pub fn delegate(
        &mut self,
        now: Duration,
        caller: Address,
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
        directory: &mut ValidatorDirectory,
        custody: &mut dyn Custody,
    ) -> Result<Effects, ProtocolError> {
        if amount == 0 {
            return Err(ProtocolError::ZeroAmount);
        }

        let id = DelegationId::derive(validator, &caller, now);
        if self.delegations.contains_key(&id) {
            return Err(ProtocolError::DuplicateDelegation(id));
        }

        let record = directory
            .local_record(validator)
            .map_err(|_| ProtocolError::UnknownValidator(validator))?;
        if !record.is_staking(&asset) {
            return Err(ProtocolError::AssetNotStaked { validator, asset });
        }
        if let Some(current) = self
            .delegators
            .get(&caller)
            .and_then(|d| d.current_validator)
        {
            if current != validator {
                return Err(ProtocolError::MultiValidatorConflict {
                    current,
                    requested: validator,
                });
            }
        }
        let account = record.custody;

        custody.transfer_in(account, caller, asset, amount)?;

        let delegation = DelegationRecord::new(validator, caller, asset, amount, now);
        self.delegations.insert(id, delegation);
        self.by_validator.entry(validator).or_default().insert(id);
        let delegator = self.delegators.entry(caller).or_default();
        delegator.current_validator.get_or_insert(validator);
        delegator.delegations.entry(asset).or_default().insert(id);

        if let Some(position) = directory
            .get_mut(validator)
            .and_then(|r| r.stakes.get_mut(&asset))
        {
            position.direct = position.direct.saturating_add(amount);
        }

        info!(
            delegation = %id,
            validator = %validator,
            delegator = %caller,
            asset = %asset,
            amount,
            "Delegation finalized"
        );
        Ok(Effects::new(CommandOutcome::Delegated(id)).emit(Fact::DelegationFinalized {
            id,
            validator,
            delegator: caller,
            asset,
            amount,
        }))
    }

    /// Start withdrawing a delegation.
    ///
    /// Freezes the slash-adjusted amount, marks the delegation inactive and
    /// starts the refund timelock. `slashes` are the validator's slash
    /// records in arrival order.
    pub fn initiate_refund<'a>(
        &mut self,
        now: Duration,
        caller: Address,
        id: DelegationId,
        slashes: impl IntoIterator<Item = &'a SlashRecord>,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let refund_delay = self.refund_delay;
        let delegation = self
            .delegations
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownDelegation(id))?;
        if delegation.delegator != caller {
            return Err(ProtocolError::NotOwner(id));
        }
        match delegation.status() {
            DelegationStatus::Refunded => return Err(ProtocolError::AlreadyRefunded(id)),
            DelegationStatus::RefundInitiated => return Err(ProtocolError::AlreadyInitiated(id)),
            DelegationStatus::Active => {}
        }

        let refundable = slash_adjusted_amount(
            delegation.principal,
            &delegation.asset,
            delegation.created_at,
            now,
            slashes,
        );

        delegation.active = false;
        delegation.refund_initiated_at = Some(now);
        delegation.refundable = refundable;
        directory.release_stake(delegation.validator, &delegation.asset, delegation.principal);

        let unlock_at = now + refund_delay;
        info!(
            delegation = %id,
            principal = delegation.principal,
            refundable,
            unlock_at = ?unlock_at,
            "Refund initiated"
        );
        Ok(Effects::new(CommandOutcome::RefundInitiated {
            refundable,
            unlock_at,
        })
        .emit(Fact::RefundInitiated { id, refundable }))
    }

    /// Pay out an initiated refund once its timelock has elapsed.
    ///
    /// The payout is the amount frozen at initiation; later slashes do not
    /// change it.
    pub fn refund(
        &mut self,
        now: Duration,
        caller: Address,
        id: DelegationId,
        directory: &ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let delegation = self
            .delegations
            .get(&id)
            .ok_or(ProtocolError::UnknownDelegation(id))?;
        if delegation.delegator != caller {
            return Err(ProtocolError::NotOwner(id));
        }
        if delegation.refunded {
            return Err(ProtocolError::AlreadyRefunded(id));
        }
        let initiated_at = delegation
            .refund_initiated_at
            .ok_or(ProtocolError::RefundNotInitiated(id))?;
        let unlock_at = initiated_at + self.refund_delay;
        if now < unlock_at {
            return Err(ProtocolError::TimelockNotElapsed { now, unlock_at });
        }
        let account = directory
            .get(delegation.validator)
            .map(|r| r.custody)
            .ok_or(ProtocolError::NoValidatorAccount(delegation.validator))?;

        let Some(delegation) = self.delegations.get_mut(&id) else {
            return Err(ProtocolError::UnknownDelegation(id));
        };
        delegation.refunded = true;
        let (validator, delegator, asset, amount) = (
            delegation.validator,
            delegation.delegator,
            delegation.asset,
            delegation.refundable,
        );
        self.release_delegator_if_done(delegator, validator);

        info!(delegation = %id, delegator = %delegator, amount, "Refund executed");
        let mut effects = Effects::new(CommandOutcome::Refunded { amount }).emit(Fact::Refunded {
            id,
            delegator,
            amount,
        });
        if amount > 0 {
            effects = effects.settle(Settlement::TransferOut {
                account,
                to: delegator,
                asset,
                amount,
            });
        }
        Ok(effects)
    }

    /// Clear the delegator's current validator once every delegation to it
    /// has been refunded.
    fn release_delegator_if_done(&mut self, delegator: Address, validator: ValidatorId) {
        let Some(state) = self.delegators.get(&delegator) else {
            return;
        };
        let all_refunded = state
            .all_delegations()
            .filter_map(|id| self.delegations.get(id))
            .filter(|d| d.validator == validator)
            .all(|d| d.refunded);

        if all_refunded {
            if let Some(state) = self.delegators.get_mut(&delegator) {
                if state.current_validator == Some(validator) {
                    state.current_validator = None;
                    debug!(delegator = %delegator, validator = %validator, "Delegator released");
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Get a delegation.
    pub fn delegation(&self, id: &DelegationId) -> Option<&DelegationRecord> {
        self.delegations.get(id)
    }

    /// Lifecycle position of a delegation.
    pub fn status(&self, id: &DelegationId) -> Option<DelegationStatus> {
        self.delegations.get(id).map(|d| d.status())
    }

    /// Get a delegator's state.
    pub fn delegator(&self, address: &Address) -> Option<&DelegatorState> {
        self.delegators.get(address)
    }

    /// Delegations made to a validator, in id order.
    pub fn delegations_of_validator(
        &self,
        validator: ValidatorId,
    ) -> impl Iterator<Item = &DelegationRecord> {
        self.by_validator
            .get(&validator)
            .into_iter()
            .flatten()
            .filter_map(|id| self.delegations.get(id))
    }

    /// Iterate over all delegations.
    pub fn iter(&self) -> impl Iterator<Item = &DelegationRecord> {
        self.delegations.values()
    }

    /// Number of delegations, refunded ones included.
    pub fn len(&self) -> usize {
        self.delegations.len()
    }

    /// Check if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use xstake_test_helpers::{slash_record, test_address, test_token, TestCustody};
    use xstake_types::{DomainId, ServiceId};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    struct Fixture {
        ledger: DelegationLedger,
        directory: ValidatorDirectory,
        custody: TestCustody,
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn no_slashes() -> Vec<SlashRecord> {
        Vec::new()
    }

    /// Validator 1 staking 10_000 of token 1; delegators 10 and 11 funded.
    fn fixture() -> Fixture {
        let mut directory = ValidatorDirectory::new(DomainId(1));
        let mut custody = TestCustody::new();
        directory
            .register_validator(ValidatorId(1), test_address(100), test_address(1))
            .unwrap();
        directory
            .register_validator(ValidatorId(2), test_address(200), test_address(2))
            .unwrap();
        for v in [1, 2] {
            custody.mint(test_address(v), test_token(1), 10_000);
            directory
                .bond(test_address(v), ValidatorId(v), test_token(1), 10_000, &mut custody)
                .unwrap();
        }
        custody.mint(test_address(10), test_token(1), 5_000);
        custody.mint(test_address(11), test_token(1), 5_000);

        Fixture {
            ledger: DelegationLedger::new(DAY),
            directory,
            custody,
        }
    }

    fn delegate(f: &mut Fixture, at: u64, delegator: u64, amount: Amount) -> DelegationId {
        let effects = f
            .ledger
            .delegate(
                secs(at),
                test_address(delegator),
                ValidatorId(1),
                test_token(1),
                amount,
                &mut f.directory,
                &mut f.custody,
            )
            .unwrap();
        match effects.outcome {
            CommandOutcome::Delegated(id) => id,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_sequential_slash_adjustment() {
        let slashes = vec![
            slash_record(ValidatorId(1), ServiceId(1), test_token(1), 1_000, 5),
            slash_record(ValidatorId(1), ServiceId(2), test_token(1), 5_000, 6),
        ];
        // 1000 → 900 → 450
        let amount = slash_adjusted_amount(1_000, &test_token(1), secs(0), secs(10), &slashes);
        assert_eq!(amount, 450);
    }

    #[test]
    fn test_slash_window_is_open_on_both_ends() {
        let slashes = vec![
            slash_record(ValidatorId(1), ServiceId(1), test_token(1), 1_000, 0),
            slash_record(ValidatorId(1), ServiceId(2), test_token(1), 1_000, 10),
            slash_record(ValidatorId(1), ServiceId(3), test_token(2), 1_000, 5),
        ];
        let amount = slash_adjusted_amount(1_000, &test_token(1), secs(0), secs(10), &slashes);
        assert_eq!(amount, 1_000);
    }

    #[traced_test]
    #[test]
    fn test_delegate_moves_funds_and_indexes() {
        let mut f = fixture();
        let id = delegate(&mut f, 0, 10, 1_000);

        assert_eq!(f.custody.balance_of(test_address(100), test_token(1)), 11_000);
        assert_eq!(f.custody.balance_of(test_address(10), test_token(1)), 4_000);
        assert_eq!(f.directory.total_stake(ValidatorId(1), &test_token(1)), 11_000);

        let delegator = f.ledger.delegator(&test_address(10)).unwrap();
        assert_eq!(delegator.current_validator, Some(ValidatorId(1)));
        assert_eq!(delegator.all_delegations().count(), 1);
        assert_eq!(f.ledger.delegations_of_validator(ValidatorId(1)).count(), 1);
        assert_eq!(f.ledger.status(&id), Some(DelegationStatus::Active));
    }

    #[test]
    fn test_delegate_rejections() {
        let mut f = fixture();
        delegate(&mut f, 0, 10, 1_000);

        // Same delegator, validator and instant.
        let result = f.ledger.delegate(
            secs(0),
            test_address(10),
            ValidatorId(1),
            test_token(1),
            1,
            &mut f.directory,
            &mut f.custody,
        );
        assert!(matches!(result, Err(ProtocolError::DuplicateDelegation(_))));

        let result = f.ledger.delegate(
            secs(1),
            test_address(10),
            ValidatorId(2),
            test_token(1),
            1,
            &mut f.directory,
            &mut f.custody,
        );
        assert_eq!(
            result,
            Err(ProtocolError::MultiValidatorConflict {
                current: ValidatorId(1),
                requested: ValidatorId(2),
            })
        );

        let result = f.ledger.delegate(
            secs(1),
            test_address(11),
            ValidatorId(9),
            test_token(1),
            1,
            &mut f.directory,
            &mut f.custody,
        );
        assert_eq!(result, Err(ProtocolError::UnknownValidator(ValidatorId(9))));

        let result = f.ledger.delegate(
            secs(1),
            test_address(11),
            ValidatorId(1),
            Asset::Native,
            1,
            &mut f.directory,
            &mut f.custody,
        );
        assert_eq!(
            result,
            Err(ProtocolError::AssetNotStaked {
                validator: ValidatorId(1),
                asset: Asset::Native,
            })
        );

        let result = f.ledger.delegate(
            secs(1),
            test_address(11),
            ValidatorId(1),
            test_token(1),
            0,
            &mut f.directory,
            &mut f.custody,
        );
        assert_eq!(result, Err(ProtocolError::ZeroAmount));
        assert_eq!(f.ledger.len(), 1);
    }

    #[traced_test]
    #[test]
    fn test_refund_example_with_slash() {
        // delegate 1000 at t=0, 10% slash at t=5, initiate at t=10
        let mut f = fixture();
        let id = delegate(&mut f, 0, 10, 1_000);
        let slashes = vec![slash_record(ValidatorId(1), ServiceId(1), test_token(1), 1_000, 5)];

        let effects = f
            .ledger
            .initiate_refund(secs(10), test_address(10), id, &slashes, &mut f.directory)
            .unwrap();
        assert_eq!(
            effects.outcome,
            CommandOutcome::RefundInitiated {
                refundable: 900,
                unlock_at: secs(10) + DAY,
            }
        );
        assert_eq!(f.ledger.status(&id), Some(DelegationStatus::RefundInitiated));

        // One second early.
        let result = f
            .ledger
            .refund(secs(9) + DAY, test_address(10), id, &f.directory);
        assert!(matches!(
            result,
            Err(ProtocolError::TimelockNotElapsed { .. })
        ));

        // Exactly at the unlock time.
        let effects = f
            .ledger
            .refund(secs(10) + DAY, test_address(10), id, &f.directory)
            .unwrap();
        assert_eq!(effects.outcome, CommandOutcome::Refunded { amount: 900 });
        assert_eq!(
            effects.settlements,
            vec![Settlement::TransferOut {
                account: test_address(100),
                to: test_address(10),
                asset: test_token(1),
                amount: 900,
            }]
        );
        assert_eq!(f.ledger.status(&id), Some(DelegationStatus::Refunded));
    }

    #[test]
    fn test_slash_before_delegation_is_ignored() {
        let mut f = fixture();
        let id = delegate(&mut f, 10, 10, 1_000);
        let slashes = vec![slash_record(ValidatorId(1), ServiceId(1), test_token(1), 1_000, 5)];

        let effects = f
            .ledger
            .initiate_refund(secs(20), test_address(10), id, &slashes, &mut f.directory)
            .unwrap();
        assert!(matches!(
            effects.outcome,
            CommandOutcome::RefundInitiated {
                refundable: 1_000,
                ..
            }
        ));
    }

    #[test]
    fn test_refund_amount_frozen_at_initiation() {
        let mut f = fixture();
        let id = delegate(&mut f, 0, 10, 1_000);
        f.ledger
            .initiate_refund(secs(10), test_address(10), id, &no_slashes(), &mut f.directory)
            .unwrap();

        // A slash lands after initiation; the payout does not change.
        let effects = f
            .ledger
            .refund(secs(10) + DAY, test_address(10), id, &f.directory)
            .unwrap();
        assert_eq!(effects.outcome, CommandOutcome::Refunded { amount: 1_000 });
    }

    #[test]
    fn test_refund_state_guards() {
        let mut f = fixture();
        let id = delegate(&mut f, 0, 10, 1_000);

        assert_eq!(
            f.ledger.refund(secs(1), test_address(10), id, &f.directory),
            Err(ProtocolError::RefundNotInitiated(id))
        );
        assert_eq!(
            f.ledger
                .initiate_refund(secs(1), test_address(11), id, &no_slashes(), &mut f.directory),
            Err(ProtocolError::NotOwner(id))
        );

        f.ledger
            .initiate_refund(secs(1), test_address(10), id, &no_slashes(), &mut f.directory)
            .unwrap();
        assert_eq!(
            f.ledger
                .initiate_refund(secs(2), test_address(10), id, &no_slashes(), &mut f.directory),
            Err(ProtocolError::AlreadyInitiated(id))
        );

        f.ledger
            .refund(secs(1) + DAY, test_address(10), id, &f.directory)
            .unwrap();
        assert_eq!(
            f.ledger
                .refund(secs(2) + DAY, test_address(10), id, &f.directory),
            Err(ProtocolError::AlreadyRefunded(id))
        );
        assert_eq!(
            f.ledger
                .initiate_refund(secs(3) + DAY, test_address(10), id, &no_slashes(), &mut f.directory),
            Err(ProtocolError::AlreadyRefunded(id))
        );
    }

    #[test]
    fn test_exactly_one_status_holds() {
        let mut f = fixture();
        let id = delegate(&mut f, 0, 10, 1_000);

        let check = |ledger: &DelegationLedger| {
            let d = ledger.delegation(&id).unwrap();
            let states = [
                d.active,
                d.refund_initiated_at.is_some() && !d.refunded,
                d.refunded,
            ];
            assert_eq!(states.iter().filter(|s| **s).count(), 1);
        };

        check(&f.ledger);
        f.ledger
            .initiate_refund(secs(1), test_address(10), id, &no_slashes(), &mut f.directory)
            .unwrap();
        check(&f.ledger);
        f.ledger
            .refund(secs(1) + DAY, test_address(10), id, &f.directory)
            .unwrap();
        check(&f.ledger);
    }

    #[test]
    fn test_full_refund_releases_delegator() {
        let mut f = fixture();
        let first = delegate(&mut f, 0, 10, 1_000);
        let second = delegate(&mut f, 1, 10, 500);
        assert_eq!(f.directory.total_stake(ValidatorId(1), &test_token(1)), 11_500);

        f.ledger
            .initiate_refund(secs(2), test_address(10), first, &no_slashes(), &mut f.directory)
            .unwrap();
        f.ledger
            .refund(secs(2) + DAY, test_address(10), first, &f.directory)
            .unwrap();
        assert_eq!(
            f.ledger
                .delegator(&test_address(10))
                .unwrap()
                .current_validator,
            Some(ValidatorId(1))
        );

        f.ledger
            .initiate_refund(secs(3) + DAY, test_address(10), second, &no_slashes(), &mut f.directory)
            .unwrap();
        f.ledger
            .refund(secs(3) + DAY + DAY, test_address(10), second, &f.directory)
            .unwrap();
        assert_eq!(
            f.ledger
                .delegator(&test_address(10))
                .unwrap()
                .current_validator,
            None
        );
        assert_eq!(f.directory.total_stake(ValidatorId(1), &test_token(1)), 10_000);

        // Free to pick another validator now.
        f.ledger
            .delegate(
                secs(4) + DAY + DAY,
                test_address(10),
                ValidatorId(2),
                test_token(1),
                100,
                &mut f.directory,
                &mut f.custody,
            )
            .unwrap();
    }
}
