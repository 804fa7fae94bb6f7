//! Service registry.

use crate::RequirementTable;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use xstake_core::{Effects, Fact, ProtocolError};
use xstake_types::{Address, Amount, Asset, DomainId, ServiceId, SlashPolicy, ValidatorId};

/// A service hosted on this domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Service identity.
    pub id: ServiceId,
    /// Account allowed to slash, reward and set requirements.
    pub account: Address,
    /// Domain hosting the service.
    pub domain: DomainId,
    /// Eligibility requirements for enrolling validators.
    pub requirements: RequirementTable,
    /// Penalty bounds per severity tier.
    pub policy: SlashPolicy,
    /// Enrolled (validator, asset) pairs.
    pub roster: BTreeSet<(ValidatorId, Asset)>,
}

impl ServiceRecord {
    /// Whether `validator` is on the roster for `asset`.
    pub fn has_member(&self, validator: ValidatorId, asset: &Asset) -> bool {
        self.roster.contains(&(validator, *asset))
    }

    /// Whether `validator` is on the roster for any asset.
    pub fn has_validator(&self, validator: ValidatorId) -> bool {
        self.roster
            .range((validator, Asset::Native)..)
            .next()
            .is_some_and(|(v, _)| *v == validator)
    }
}

/// Services hosted on one domain, indexed by id and by account.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    local: DomainId,
    services: BTreeMap<ServiceId, ServiceRecord>,
    accounts: BTreeMap<Address, ServiceId>,
}

impl ServiceRegistry {
    /// Create an empty registry for a domain.
    pub fn new(local: DomainId) -> Self {
        Self {
            local,
            services: BTreeMap::new(),
            accounts: BTreeMap::new(),
        }
    }

    /// Register a service with an empty requirement table.
    pub fn register_service(
        &mut self,
        id: ServiceId,
        account: Address,
        policy: SlashPolicy,
    ) -> Result<Effects, ProtocolError> {
        if self.services.contains_key(&id) {
            return Err(ProtocolError::ServiceAlreadyRegistered(id));
        }
        if let Some(existing) = self.accounts.get(&account) {
            return Err(ProtocolError::ServiceAlreadyRegistered(*existing));
        }
        if !policy.is_valid() {
            return Err(ProtocolError::InvalidSlashPolicy(id));
        }

        self.services.insert(
            id,
            ServiceRecord {
                id,
                account,
                domain: self.local,
                requirements: RequirementTable::new(),
                policy,
                roster: BTreeSet::new(),
            },
        );
        self.accounts.insert(account, id);

        info!(service = %id, account = %account, "Service registered");
        Ok(Effects::done().emit(Fact::ServiceRegistered { service: id }))
    }

    /// Publish or replace an eligibility requirement. Service account only.
    pub fn set_requirement(
        &mut self,
        caller: Address,
        service: ServiceId,
        token: Asset,
        chain: DomainId,
        minimum: Amount,
    ) -> Result<Effects, ProtocolError> {
        let record = self.authorized_mut(caller, service)?;
        record.requirements.set(token, chain, minimum);

        debug!(
            service = %service,
            token = %token,
            chain = %chain,
            minimum,
            "Eligibility requirement set"
        );
        Ok(Effects::done())
    }

    /// Add a (validator, asset) pair to a service roster.
    ///
    /// Returns false if it was already present.
    pub fn add_member(&mut self, service: ServiceId, validator: ValidatorId, asset: Asset) -> bool {
        self.services
            .get_mut(&service)
            .is_some_and(|s| s.roster.insert((validator, asset)))
    }

    /// Remove a (validator, asset) pair from a service roster.
    ///
    /// Returns false if it was not present.
    pub fn remove_member(
        &mut self,
        service: ServiceId,
        validator: ValidatorId,
        asset: &Asset,
    ) -> bool {
        self.services
            .get_mut(&service)
            .is_some_and(|s| s.roster.remove(&(validator, *asset)))
    }

    /// Get a service, checking that `caller` is its account.
    pub fn authorized(&self, caller: Address, id: ServiceId) -> Result<&ServiceRecord, ProtocolError> {
        let record = self
            .services
            .get(&id)
            .ok_or(ProtocolError::UnknownService(id))?;
        if record.account != caller {
            return Err(ProtocolError::Unauthorized { caller });
        }
        Ok(record)
    }

    fn authorized_mut(
        &mut self,
        caller: Address,
        id: ServiceId,
    ) -> Result<&mut ServiceRecord, ProtocolError> {
        let record = self
            .services
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownService(id))?;
        if record.account != caller {
            return Err(ProtocolError::Unauthorized { caller });
        }
        Ok(record)
    }

    /// Get a service.
    pub fn get(&self, id: ServiceId) -> Option<&ServiceRecord> {
        self.services.get(&id)
    }

    /// Service registered under an account.
    pub fn service_for_account(&self, account: &Address) -> Option<ServiceId> {
        self.accounts.get(account).copied()
    }

    /// Check if a service is registered.
    pub fn contains(&self, id: ServiceId) -> bool {
        self.services.contains_key(&id)
    }

    /// Iterate over all services.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.services.values()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
