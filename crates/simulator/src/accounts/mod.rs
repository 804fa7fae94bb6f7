//! Participants of a simulation.
//!
//! Provides a `ParticipantPool` holding the validators, services and
//! delegators of every domain, plus the simulator's view of what each has
//! done so far. All accounts are funded at genesis.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::info;
use xstake_core::Command;
use xstake_types::{
    Address, Amount, Asset, DelegationId, DomainId, ServiceId, SlashPolicy, ValidatorId,
};

/// Token staked by validators and delegators of a domain.
pub fn stake_token(domain: DomainId) -> Asset {
    Asset::Token(Address::from_seed(
        &[b"stake".as_slice(), &domain.0.to_le_bytes()].concat(),
    ))
}

/// Token services on a domain pay rewards in.
pub fn reward_token(domain: DomainId) -> Asset {
    Asset::Token(Address::from_seed(
        &[b"reward".as_slice(), &domain.0.to_le_bytes()].concat(),
    ))
}

fn account(role: &[u8], domain: DomainId, index: usize) -> Address {
    Address::from_seed(&[role, &domain.0.to_le_bytes(), &(index as u64).to_le_bytes()].concat())
}

/// A validator registered at genesis.
#[derive(Clone, Debug)]
pub struct SimValidator {
    pub id: ValidatorId,
    pub origin: DomainId,
    pub operator: Address,
    pub custody: Address,
}

/// A service registered at genesis.
#[derive(Clone, Debug)]
pub struct SimService {
    pub id: ServiceId,
    pub domain: DomainId,
    pub account: Address,
}

/// A funded delegator account.
#[derive(Clone, Debug)]
pub struct Delegator {
    pub address: Address,
    pub domain: DomainId,
    /// Validator this delegator is committed to, once it has delegated.
    pub validator: Option<ValidatorId>,
}

/// One validator/service/asset enrollment as the simulator tracks it.
pub type EnrollmentKey = (ValidatorId, ServiceId, Asset);

/// Pool of participants distributed across domains.
pub struct ParticipantPool {
    validators: Vec<SimValidator>,
    services: Vec<SimService>,
    delegators: Vec<Delegator>,

    /// Delegations not yet withdrawn.
    active: Vec<(usize, DelegationId)>,
    /// Refunds initiated, keyed by delegation, with the time they unlock.
    refunding: BTreeMap<DelegationId, (usize, Duration)>,

    enrolled: BTreeSet<EnrollmentKey>,
    in_flight: BTreeSet<EnrollmentKey>,
    /// Detachments initiated, with the earliest time to try executing.
    detaching: BTreeMap<EnrollmentKey, Duration>,
}

impl ParticipantPool {
    /// Generate participants for `num_domains` domains.
    pub fn generate(
        num_domains: u64,
        validators_per_domain: usize,
        services_per_domain: usize,
        delegators_per_domain: usize,
    ) -> Self {
        info!(
            num_domains,
            validators_per_domain, services_per_domain, delegators_per_domain, "Generating participants"
        );

        let mut pool = Self {
            validators: Vec::new(),
            services: Vec::new(),
            delegators: Vec::new(),
            active: Vec::new(),
            refunding: BTreeMap::new(),
            enrolled: BTreeSet::new(),
            in_flight: BTreeSet::new(),
            detaching: BTreeMap::new(),
        };

        for d in 0..num_domains {
            let domain = DomainId(d + 1);
            for i in 0..validators_per_domain {
                pool.validators.push(SimValidator {
                    id: ValidatorId(domain.0 * 1_000 + i as u64),
                    origin: domain,
                    operator: account(b"operator", domain, i),
                    custody: account(b"custody", domain, i),
                });
            }
            for i in 0..services_per_domain {
                pool.services.push(SimService {
                    id: ServiceId(domain.0 * 1_000 + i as u64),
                    domain,
                    account: account(b"service", domain, i),
                });
            }
            for i in 0..delegators_per_domain {
                pool.delegators.push(Delegator {
                    address: account(b"delegator", domain, i),
                    domain,
                    validator: None,
                });
            }
        }

        info!(
            validators = pool.validators.len(),
            services = pool.services.len(),
            delegators = pool.delegators.len(),
            "Generated participants"
        );
        pool
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Genesis
    // ═══════════════════════════════════════════════════════════════════════

    /// Balances to mint before genesis commands run.
    pub fn genesis_balances(&self, balance: Amount) -> Vec<(DomainId, Address, Asset, Amount)> {
        let validators = self
            .validators
            .iter()
            .map(|v| (v.origin, v.operator, stake_token(v.origin), balance));
        let services = self
            .services
            .iter()
            .map(|s| (s.domain, s.account, reward_token(s.domain), balance));
        let delegators = self
            .delegators
            .iter()
            .map(|d| (d.domain, d.address, stake_token(d.domain), balance));
        validators.chain(services).chain(delegators).collect()
    }

    /// Registrations and self-bonds, as (domain, caller, command).
    pub fn genesis_commands(&self, self_bond: Amount) -> Vec<(DomainId, Address, Command)> {
        let mut commands = Vec::new();
        for v in &self.validators {
            commands.push((
                v.origin,
                v.operator,
                Command::RegisterValidator {
                    validator: v.id,
                    custody: v.custody,
                    operator: v.operator,
                },
            ));
            commands.push((
                v.origin,
                v.operator,
                Command::Bond {
                    validator: v.id,
                    asset: stake_token(v.origin),
                    amount: self_bond,
                },
            ));
        }
        for s in &self.services {
            commands.push((
                s.domain,
                s.account,
                Command::RegisterService {
                    service: s.id,
                    account: s.account,
                    policy: SlashPolicy::default(),
                },
            ));
        }
        commands
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Selection
    // ═══════════════════════════════════════════════════════════════════════

    /// Pick a random validator.
    pub fn random_validator(&self, rng: &mut impl rand::Rng) -> Option<&SimValidator> {
        pick(&self.validators, rng)
    }

    /// Pick a random service, on `domain` or elsewhere.
    pub fn random_service(
        &self,
        rng: &mut impl rand::Rng,
        domain: DomainId,
        local: bool,
    ) -> Option<&SimService> {
        let candidates: Vec<&SimService> = self
            .services
            .iter()
            .filter(|s| (s.domain == domain) == local)
            .collect();
        pick(&candidates, rng).copied()
    }

    /// Pick a random delegator index.
    pub fn random_delegator(&self, rng: &mut impl rand::Rng) -> Option<usize> {
        (!self.delegators.is_empty()).then(|| rng.gen_range(0..self.delegators.len()))
    }

    /// Pick a random settled enrollment that is not detaching.
    pub fn random_enrollment(&self, rng: &mut impl rand::Rng) -> Option<EnrollmentKey> {
        let candidates: Vec<&EnrollmentKey> = self
            .enrolled
            .iter()
            .filter(|key| !self.detaching.contains_key(*key))
            .collect();
        pick(&candidates, rng).map(|key| **key)
    }

    /// Pick a random delegation that can start its refund.
    pub fn random_active_delegation(&self, rng: &mut impl rand::Rng) -> Option<(usize, DelegationId)> {
        pick(&self.active, rng).copied()
    }

    pub fn delegator(&self, index: usize) -> &Delegator {
        &self.delegators[index]
    }

    pub fn validator(&self, id: ValidatorId) -> Option<&SimValidator> {
        self.validators.iter().find(|v| v.id == id)
    }

    pub fn service(&self, id: ServiceId) -> Option<&SimService> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Validators native to `domain`.
    pub fn validators_on(&self, domain: DomainId) -> impl Iterator<Item = &SimValidator> {
        self.validators.iter().filter(move |v| v.origin == domain)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tracking
    // ═══════════════════════════════════════════════════════════════════════

    /// Commit a delegator to a validator and record the new delegation.
    pub fn record_delegation(&mut self, index: usize, validator: ValidatorId, id: DelegationId) {
        self.delegators[index].validator = Some(validator);
        self.active.push((index, id));
    }

    /// Move a delegation from active to refunding.
    pub fn record_refund_initiated(&mut self, id: DelegationId, unlock_at: Duration) {
        if let Some(pos) = self.active.iter().position(|(_, d)| *d == id) {
            let (index, _) = self.active.swap_remove(pos);
            self.refunding.insert(id, (index, unlock_at));
        }
    }

    pub fn record_refunded(&mut self, id: DelegationId) {
        self.refunding.remove(&id);
    }

    /// Refunds whose timelock has elapsed at `now`.
    pub fn refunds_due(&self, now: Duration) -> Vec<(usize, DelegationId)> {
        self.refunding
            .iter()
            .filter(|(_, (_, unlock_at))| *unlock_at <= now)
            .map(|(id, (index, _))| (*index, *id))
            .collect()
    }

    /// Whether an enrollment is settled or being settled.
    pub fn is_tracked(&self, key: &EnrollmentKey) -> bool {
        self.enrolled.contains(key) || self.in_flight.contains(key)
    }

    pub fn record_enroll_sent(&mut self, key: EnrollmentKey) {
        self.in_flight.insert(key);
    }

    pub fn record_enrolled(&mut self, key: EnrollmentKey) {
        self.in_flight.remove(&key);
        self.enrolled.insert(key);
    }

    pub fn record_enroll_failed(&mut self, key: &EnrollmentKey) {
        self.in_flight.remove(key);
    }

    pub fn record_detach_sent(&mut self, key: EnrollmentKey, ready_at: Duration) {
        self.detaching.insert(key, ready_at);
    }

    /// Forget a detachment that will not complete.
    pub fn record_detach_abandoned(&mut self, key: &EnrollmentKey) {
        self.detaching.remove(key);
    }

    pub fn record_detached(&mut self, key: &EnrollmentKey) {
        self.detaching.remove(key);
        self.enrolled.remove(key);
    }

    /// Every detachment in progress.
    pub fn detaching(&self) -> impl Iterator<Item = &EnrollmentKey> {
        self.detaching.keys()
    }

    /// Detachments whose timelock should have elapsed at `now`.
    pub fn detachments_due(&self, now: Duration) -> Vec<EnrollmentKey> {
        self.detaching
            .iter()
            .filter(|(_, ready_at)| **ready_at <= now)
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn enrolled_count(&self) -> usize {
        self.enrolled.len()
    }

    pub fn total_participants(&self) -> usize {
        self.validators.len() + self.services.len() + self.delegators.len()
    }
}

fn pick<'a, T>(items: &'a [T], rng: &mut impl rand::Rng) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(rng.gen_range(0..items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_generate_distributes_participants() {
        let pool = ParticipantPool::generate(3, 2, 1, 5);
        assert_eq!(pool.total_participants(), 3 * (2 + 1 + 5));
        assert_eq!(pool.validators_on(DomainId(2)).count(), 2);
        assert_eq!(pool.genesis_balances(10).len(), 3 * (2 + 1 + 5));
        // Register plus bond per validator, register per service.
        assert_eq!(pool.genesis_commands(1).len(), 3 * (2 * 2 + 1));
    }

    #[test]
    fn test_remote_service_is_on_another_domain() {
        let pool = ParticipantPool::generate(3, 1, 2, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            let service = pool.random_service(&mut rng, DomainId(1), false).unwrap();
            assert_ne!(service.domain, DomainId(1));
            let service = pool.random_service(&mut rng, DomainId(1), true).unwrap();
            assert_eq!(service.domain, DomainId(1));
        }
    }

    #[test]
    fn test_detaching_enrollment_is_not_picked() {
        let mut pool = ParticipantPool::generate(1, 1, 1, 0);
        let key = (ValidatorId(1_000), ServiceId(1_000), stake_token(DomainId(1)));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        pool.record_enroll_sent(key);
        assert!(pool.is_tracked(&key));
        assert_eq!(pool.random_enrollment(&mut rng), None);

        pool.record_enrolled(key);
        assert_eq!(pool.random_enrollment(&mut rng), Some(key));

        pool.record_detach_sent(key, Duration::from_secs(10));
        assert_eq!(pool.random_enrollment(&mut rng), None);
        assert!(pool.detachments_due(Duration::from_secs(9)).is_empty());
        assert_eq!(pool.detachments_due(Duration::from_secs(10)), vec![key]);

        pool.record_detached(&key);
        assert!(!pool.is_tracked(&key));
    }
}
