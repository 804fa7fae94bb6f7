//! Validator directory.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use xstake_core::{Custody, Effects, Fact, ProtocolError};
use xstake_types::{
    Address, Amount, Asset, AttestedStake, DomainId, PenaltySplit, ServiceId, ValidatorDescriptor,
    ValidatorId, ValidatorRecord,
};

/// Every validator record known to one domain.
///
/// Records are created on registration (local validators) or on the first
/// accepted enrollment (mirrors of remote validators). They are never
/// deleted, only emptied.
#[derive(Debug, Clone)]
pub struct ValidatorDirectory {
    local: DomainId,
    validators: BTreeMap<ValidatorId, ValidatorRecord>,
}

impl ValidatorDirectory {
    /// Create an empty directory for a domain.
    pub fn new(local: DomainId) -> Self {
        Self {
            local,
            validators: BTreeMap::new(),
        }
    }

    /// The domain this directory belongs to.
    pub fn local(&self) -> DomainId {
        self.local
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Registration & stake
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a validator whose custody account lives on this domain.
    pub fn register_validator(
        &mut self,
        id: ValidatorId,
        custody: Address,
        operator: Address,
    ) -> Result<Effects, ProtocolError> {
        if self.validators.contains_key(&id) {
            return Err(ProtocolError::ValidatorAlreadyRegistered(id));
        }

        self.validators
            .insert(id, ValidatorRecord::new(id, self.local, custody, operator));

        info!(validator = %id, custody = %custody, operator = %operator, "Validator registered");
        Ok(Effects::done().emit(Fact::ValidatorRegistered { validator: id }))
    }

    /// Self-bond stake from the operator into the validator's custody account.
    ///
    /// The custody pull happens after validation and before bookkeeping; if
    /// custody refuses, nothing changes.
    pub fn bond(
        &mut self,
        caller: Address,
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
        custody: &mut dyn Custody,
    ) -> Result<Effects, ProtocolError> {
        if amount == 0 {
            return Err(ProtocolError::ZeroAmount);
        }
        let record = self.local_record(validator)?;
        if record.operator != caller {
            return Err(ProtocolError::NotOperator { caller, validator });
        }
        let account = record.custody;

        custody.transfer_in(account, caller, asset, amount)?;

        let record = self.local_record_mut(validator)?;
        let position = record.stakes.entry(asset).or_default();
        position.direct = position.direct.saturating_add(amount);

        debug!(
            validator = %validator,
            asset = %asset,
            amount,
            direct = position.direct,
            "Stake bonded"
        );
        Ok(Effects::done().emit(Fact::StakeBonded {
            validator,
            asset,
            amount,
        }))
    }

    /// Record an externally attested native stake balance.
    ///
    /// An attestation older than the stored one is rejected. A positive
    /// amount re-activates the position; zero deactivates it.
    pub fn attest_external_stake(
        &mut self,
        caller: Address,
        validator: ValidatorId,
        amount: Amount,
        as_of: Duration,
    ) -> Result<Effects, ProtocolError> {
        let record = self.local_record(validator)?;
        if record.operator != caller {
            return Err(ProtocolError::NotOperator { caller, validator });
        }
        let stored = record
            .stakes
            .get(&Asset::Native)
            .and_then(|p| p.attested)
            .map(|a| a.as_of);
        if stored.is_some_and(|stored| as_of < stored) {
            return Err(ProtocolError::StaleAttestation { validator, as_of });
        }

        let record = self.local_record_mut(validator)?;
        record.stakes.entry(Asset::Native).or_default().attested = Some(AttestedStake {
            amount,
            as_of,
            active: amount > 0,
        });

        debug!(validator = %validator, amount, as_of = ?as_of, "External stake attested");
        Ok(Effects::done().emit(Fact::StakeAttested {
            validator,
            amount,
            as_of,
        }))
    }

    /// Create or refresh the mirror of a remote validator from an
    /// enrollment payload.
    ///
    /// The stake snapshot for the enrolled asset is replaced; enrollments,
    /// rewards and slash totals already accrued on the mirror are kept.
    /// Records of local validators are never overwritten by a payload.
    pub fn upsert_mirror(&mut self, descriptor: &ValidatorDescriptor) -> &mut ValidatorRecord {
        let local = self.local;
        let record = self.validators.entry(descriptor.id).or_insert_with(|| {
            debug!(
                validator = %descriptor.id,
                origin = %descriptor.origin,
                "Creating validator mirror"
            );
            ValidatorRecord::new(
                descriptor.id,
                descriptor.origin,
                descriptor.custody,
                descriptor.operator,
            )
        });

        if record.origin != local {
            record.custody = descriptor.custody;
            record.operator = descriptor.operator;
            record.stakes.entry(descriptor.asset).or_default().direct = descriptor.stake;
        }
        record
    }

    /// Apply a penalty to a validator's position in `asset`.
    ///
    /// Consumes directly held stake first, then spills into the attested
    /// balance. An attested balance driven to zero is marked inactive.
    pub fn apply_penalty(
        &mut self,
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
    ) -> Result<PenaltySplit, ProtocolError> {
        let record = self
            .validators
            .get_mut(&validator)
            .ok_or(ProtocolError::UnknownValidator(validator))?;

        let split = record.stakes.entry(asset).or_default().apply_penalty(amount);
        if split.attested_deactivated {
            info!(validator = %validator, "Attested stake exhausted, position deactivated");
        }
        Ok(split)
    }

    /// Release directly held stake, e.g. refunded delegation principal.
    pub fn release_stake(&mut self, validator: ValidatorId, asset: &Asset, amount: Amount) {
        if let Some(position) = self
            .validators
            .get_mut(&validator)
            .and_then(|r| r.stakes.get_mut(asset))
        {
            position.direct = position.direct.saturating_sub(amount);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Get a validator record.
    pub fn get(&self, id: ValidatorId) -> Option<&ValidatorRecord> {
        self.validators.get(&id)
    }

    /// Get a mutable validator record.
    pub fn get_mut(&mut self, id: ValidatorId) -> Option<&mut ValidatorRecord> {
        self.validators.get_mut(&id)
    }

    /// Get a validator registered on this domain.
    ///
    /// Mirrors of remote validators have no custody account here and are
    /// reported as `NoValidatorAccount`.
    pub fn local_record(&self, id: ValidatorId) -> Result<&ValidatorRecord, ProtocolError> {
        match self.validators.get(&id) {
            Some(record) if record.origin == self.local => Ok(record),
            Some(_) => Err(ProtocolError::NoValidatorAccount(id)),
            None => Err(ProtocolError::UnknownValidator(id)),
        }
    }

    /// Mutable variant of [`Self::local_record`].
    pub fn local_record_mut(
        &mut self,
        id: ValidatorId,
    ) -> Result<&mut ValidatorRecord, ProtocolError> {
        let local = self.local;
        match self.validators.get_mut(&id) {
            Some(record) if record.origin == local => Ok(record),
            Some(_) => Err(ProtocolError::NoValidatorAccount(id)),
            None => Err(ProtocolError::UnknownValidator(id)),
        }
    }

    /// Check if a validator is known.
    pub fn contains(&self, id: ValidatorId) -> bool {
        self.validators.contains_key(&id)
    }

    /// Total stake of a validator in an asset (zero if unknown).
    pub fn total_stake(&self, id: ValidatorId, asset: &Asset) -> Amount {
        self.validators
            .get(&id)
            .map(|r| r.total_stake(asset))
            .unwrap_or(0)
    }

    /// Whether a validator is enrolled with `service` for `asset`.
    pub fn is_enrolled(&self, id: ValidatorId, service: ServiceId, asset: &Asset) -> bool {
        self.validators
            .get(&id)
            .is_some_and(|r| r.is_enrolled(service, asset))
    }

    /// Whether a validator is enrolled with `service` for any asset.
    pub fn enrolled_with(&self, id: ValidatorId, service: ServiceId) -> bool {
        self.validators
            .get(&id)
            .is_some_and(|r| r.is_enrolled_with(service))
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.validators.values()
    }

    /// Number of records, mirrors included.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check if the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use xstake_core::CustodyError;
    use xstake_test_helpers::TestCustody;
    use xstake_types::test_utils::{test_address, test_token};

    const LOCAL: DomainId = DomainId(1);

    fn directory_with_validator() -> ValidatorDirectory {
        let mut directory = ValidatorDirectory::new(LOCAL);
        directory
            .register_validator(ValidatorId(1), test_address(100), test_address(1))
            .unwrap();
        directory
    }

    #[test]
    fn test_register_twice_fails() {
        let mut directory = directory_with_validator();
        let result = directory.register_validator(ValidatorId(1), test_address(5), test_address(6));
        assert_eq!(
            result,
            Err(ProtocolError::ValidatorAlreadyRegistered(ValidatorId(1)))
        );
        assert_eq!(directory.len(), 1);
    }

    #[traced_test]
    #[test]
    fn test_bond_pulls_funds_then_books_stake() {
        let mut directory = directory_with_validator();
        let mut custody = TestCustody::new();
        custody.mint(test_address(1), test_token(1), 1_000);

        directory
            .bond(test_address(1), ValidatorId(1), test_token(1), 400, &mut custody)
            .unwrap();

        assert_eq!(directory.total_stake(ValidatorId(1), &test_token(1)), 400);
        assert_eq!(custody.balance_of(test_address(100), test_token(1)), 400);
        assert_eq!(custody.balance_of(test_address(1), test_token(1)), 600);
    }

    #[test]
    fn test_bond_refused_by_custody_changes_nothing() {
        let mut directory = directory_with_validator();
        let mut custody = TestCustody::new();

        let result = directory.bond(test_address(1), ValidatorId(1), Asset::Native, 10, &mut custody);
        assert!(matches!(
            result,
            Err(ProtocolError::Custody(CustodyError::InsufficientFunds { .. }))
        ));
        assert_eq!(directory.total_stake(ValidatorId(1), &Asset::Native), 0);
    }

    #[test]
    fn test_bond_requires_operator() {
        let mut directory = directory_with_validator();
        let mut custody = TestCustody::new();
        let result = directory.bond(test_address(9), ValidatorId(1), Asset::Native, 10, &mut custody);
        assert_eq!(
            result,
            Err(ProtocolError::NotOperator {
                caller: test_address(9),
                validator: ValidatorId(1),
            })
        );
    }

    #[test]
    fn test_stale_attestation_rejected() {
        let mut directory = directory_with_validator();
        directory
            .attest_external_stake(test_address(1), ValidatorId(1), 500, Duration::from_secs(10))
            .unwrap();
        assert_eq!(directory.total_stake(ValidatorId(1), &Asset::Native), 500);

        let result = directory.attest_external_stake(
            test_address(1),
            ValidatorId(1),
            800,
            Duration::from_secs(9),
        );
        assert!(matches!(result, Err(ProtocolError::StaleAttestation { .. })));
        assert_eq!(directory.total_stake(ValidatorId(1), &Asset::Native), 500);
    }

    #[test]
    fn test_attestation_reactivates_drained_position() {
        let mut directory = directory_with_validator();
        directory
            .attest_external_stake(test_address(1), ValidatorId(1), 100, Duration::from_secs(1))
            .unwrap();

        let split = directory
            .apply_penalty(ValidatorId(1), Asset::Native, 100)
            .unwrap();
        assert!(split.attested_deactivated);
        assert!(!directory.get(ValidatorId(1)).unwrap().is_staking(&Asset::Native));

        directory
            .attest_external_stake(test_address(1), ValidatorId(1), 50, Duration::from_secs(2))
            .unwrap();
        assert!(directory.get(ValidatorId(1)).unwrap().is_staking(&Asset::Native));
    }

    #[test]
    fn test_mirror_refreshes_snapshot_but_keeps_enrollments() {
        let mut directory = ValidatorDirectory::new(LOCAL);
        let mut descriptor = ValidatorDescriptor {
            id: ValidatorId(7),
            origin: DomainId(2),
            custody: test_address(70),
            operator: test_address(7),
            asset: Asset::Native,
            stake: 1_000,
        };

        directory
            .upsert_mirror(&descriptor)
            .add_enrollment(ServiceId(1), Asset::Native);

        descriptor.stake = 2_000;
        directory.upsert_mirror(&descriptor);

        let record = directory.get(ValidatorId(7)).unwrap();
        assert_eq!(record.total_stake(&Asset::Native), 2_000);
        assert!(record.is_enrolled(ServiceId(1), &Asset::Native));
        assert_eq!(
            directory.local_record(ValidatorId(7)),
            Err(ProtocolError::NoValidatorAccount(ValidatorId(7)))
        );
    }

    #[test]
    fn test_mirror_never_overwrites_local_record() {
        let mut directory = directory_with_validator();
        let descriptor = ValidatorDescriptor {
            id: ValidatorId(1),
            origin: DomainId(2),
            custody: test_address(70),
            operator: test_address(7),
            asset: Asset::Native,
            stake: 1_000,
        };

        directory.upsert_mirror(&descriptor);

        let record = directory.get(ValidatorId(1)).unwrap();
        assert_eq!(record.origin, LOCAL);
        assert_eq!(record.custody, test_address(100));
        assert_eq!(record.total_stake(&Asset::Native), 0);
    }

    #[test]
    fn test_release_stake_saturates() {
        let mut directory = directory_with_validator();
        directory
            .get_mut(ValidatorId(1))
            .unwrap()
            .stakes
            .entry(Asset::Native)
            .or_default()
            .direct = 100;

        directory.release_stake(ValidatorId(1), &Asset::Native, 250);
        assert_eq!(directory.total_stake(ValidatorId(1), &Asset::Native), 0);
    }
}
