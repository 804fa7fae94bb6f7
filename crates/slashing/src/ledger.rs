//! Slash records and penalty application.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};
use xstake_core::{CommandOutcome, CrossDomainMessage, Effects, Fact, ProtocolError, Settlement};
use xstake_directory::{ServiceRegistry, ValidatorDirectory};
use xstake_messages::SlashNotice;
use xstake_types::{
    Address, Amount, Asset, Bips, DomainId, ServiceId, Severity, SlashId, SlashRecord, ValidatorId,
};

/// Every slash recorded on one domain.
#[derive(Debug, Clone)]
pub struct SlashingLedger {
    local: DomainId,
    records: BTreeMap<SlashId, SlashRecord>,
    /// Slash ids per validator, in arrival order.
    by_validator: BTreeMap<ValidatorId, Vec<SlashId>>,
}

impl SlashingLedger {
    /// Create an empty ledger.
    pub fn new(local: DomainId) -> Self {
        Self {
            local,
            records: BTreeMap::new(),
            by_validator: BTreeMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Penalise a validator enrolled with `service` for `asset`.
    ///
    /// Only the service account may call this. For a validator registered
    /// on this domain the penalty is applied immediately; for a mirrored
    /// validator it is recorded here and forwarded to the validator's origin.
    #[allow(clippy::too_many_arguments)]
    pub fn slash(
        &mut self,
        now: Duration,
        caller: Address,
        service: ServiceId,
        validator: ValidatorId,
        asset: Asset,
        severity: Severity,
        bips: Bips,
        reason: String,
        registry: &ServiceRegistry,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let record = registry.authorized(caller, service)?;
        if !record.policy.bounds(severity).contains(bips) {
            return Err(ProtocolError::PenaltyOutOfBounds { bips });
        }
        if !record.has_member(validator, &asset) {
            return Err(ProtocolError::NotEnrolledForAsset {
                validator,
                service,
                asset,
            });
        }

        let id = SlashId::derive(validator, service, now);
        if self.records.contains_key(&id) {
            return Err(ProtocolError::AlreadyExecuted(id));
        }

        let target = directory
            .get(validator)
            .ok_or(ProtocolError::UnknownValidator(validator))?;
        let origin = target.origin;
        let amount = bips.apply(target.total_stake(&asset));

        let slash = SlashRecord {
            id,
            validator,
            service,
            asset,
            bips,
            amount,
            timestamp: now,
            reason,
        };

        info!(
            slash = %id,
            validator = %validator,
            service = %service,
            severity = %severity,
            bips = %bips,
            amount,
            "Slash issued"
        );

        let mut effects = self.apply(slash.clone(), directory)?;
        effects.outcome = CommandOutcome::Slashed {
            slash_id: id,
            amount,
        };

        if origin != self.local {
            effects = effects.send(
                origin,
                CrossDomainMessage::Slash(SlashNotice {
                    slash_id: id,
                    service,
                    validator,
                    asset,
                    amount,
                    bips,
                    timestamp: now,
                    reason: slash.reason,
                }),
            );
        }
        Ok(effects)
    }

    /// Apply a penalty computed on a service's domain.
    ///
    /// The figures are taken as-is; nothing is recomputed. A notice whose
    /// slash id was already applied is rejected, as is one for a validator
    /// this domain no longer holds enrolled with the service.
    pub fn handle_incoming_slash(
        &mut self,
        from: DomainId,
        notice: SlashNotice,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        if self.records.contains_key(&notice.slash_id) {
            warn!(slash = %notice.slash_id, from = %from, "Replayed slash notice");
            return Err(ProtocolError::AlreadyExecuted(notice.slash_id));
        }
        let target = directory.local_record(notice.validator)?;
        if !target.is_enrolled(notice.service, &notice.asset) {
            warn!(
                slash = %notice.slash_id,
                validator = %notice.validator,
                service = %notice.service,
                from = %from,
                "Slash notice for a validator not enrolled with the service"
            );
            return Err(ProtocolError::NotEnrolledForAsset {
                validator: notice.validator,
                service: notice.service,
                asset: notice.asset,
            });
        }

        info!(
            slash = %notice.slash_id,
            validator = %notice.validator,
            service = %notice.service,
            from = %from,
            amount = notice.amount,
            "Applying remote slash"
        );

        self.apply(
            SlashRecord {
                id: notice.slash_id,
                validator: notice.validator,
                service: notice.service,
                asset: notice.asset,
                bips: notice.bips,
                amount: notice.amount,
                timestamp: notice.timestamp,
                reason: notice.reason,
            },
            directory,
        )
    }

    /// Record a slash, accrue it on the validator and consume its stake.
    ///
    /// Custody is marked only for validators registered here, and only for
    /// the directly held portion of the penalty.
    fn apply(
        &mut self,
        slash: SlashRecord,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let split = directory.apply_penalty(slash.validator, slash.asset, slash.amount)?;
        let record = directory
            .get_mut(slash.validator)
            .ok_or(ProtocolError::UnknownValidator(slash.validator))?;
        let total = record.slashed.entry(slash.service).or_insert(0);
        *total = total.saturating_add(slash.amount);
        let (custody, is_local) = (record.custody, record.origin == self.local);

        let mut effects = Effects::done().emit(Fact::Slashed {
            slash_id: slash.id,
            validator: slash.validator,
            service: slash.service,
            asset: slash.asset,
            amount: slash.amount,
            bips: slash.bips,
        });
        if is_local && split.from_direct > 0 {
            effects = effects.settle(Settlement::MarkSlashed {
                account: custody,
                asset: slash.asset,
                amount: split.from_direct,
            });
        }

        self.by_validator
            .entry(slash.validator)
            .or_default()
            .push(slash.id);
        self.records.insert(slash.id, slash);
        Ok(effects)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Get a slash record.
    pub fn get(&self, id: &SlashId) -> Option<&SlashRecord> {
        self.records.get(id)
    }

    /// Check if a slash id was already applied.
    pub fn contains(&self, id: &SlashId) -> bool {
        self.records.contains_key(id)
    }

    /// A validator's slashes, in arrival order.
    pub fn slashes_for(&self, validator: ValidatorId) -> impl Iterator<Item = &SlashRecord> {
        self.by_validator
            .get(&validator)
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
    }

    /// A validator's slashes in `asset` with `after < timestamp < before`,
    /// in arrival order.
    pub fn slashes_between(
        &self,
        validator: ValidatorId,
        asset: Asset,
        after: Duration,
        before: Duration,
    ) -> impl Iterator<Item = &SlashRecord> {
        self.slashes_for(validator)
            .filter(move |s| s.asset == asset && after < s.timestamp && s.timestamp < before)
    }

    /// Sum of penalties issued against a validator in an asset.
    pub fn total_slashed(&self, validator: ValidatorId, asset: &Asset) -> Amount {
        self.slashes_for(validator)
            .filter(|s| s.asset == *asset)
            .map(|s| s.amount)
            .fold(0, Amount::saturating_add)
    }

    /// Number of slash records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
