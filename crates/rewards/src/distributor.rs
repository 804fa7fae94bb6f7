//! Reward accrual, claims and delegator distributions.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, warn};
use xstake_core::{
    CommandOutcome, CrossDomainMessage, Custody, Effects, Fact, MerkleProofVerifier,
    ProofVerifier, ProtocolError, Settlement,
};
use xstake_directory::{ServiceRegistry, ValidatorDirectory};
use xstake_messages::{ClaimRewardConfirmed, ClaimRewardRequest};
use xstake_types::{
    Address, Amount, Asset, Bips, DelegatorShare, DistributionId, DomainId, Hash, MerkleProof,
    RewardsDistribution, ServiceId, ValidatorId,
};

/// Result of splitting a validator's balances.
struct Payout {
    effects: Effects,
    paid: Vec<(Asset, Amount)>,
    distributions: Vec<DistributionId>,
}

/// Reward balances are kept on the validator records in the directory;
/// this component owns the vault, the distributions and the claim ledger.
#[derive(Debug, Clone)]
pub struct RewardsDistributor<V = MerkleProofVerifier> {
    local: DomainId,
    /// Account holding submitted rewards until they are paid out.
    vault: Address,
    /// Account allowed to publish commitment roots.
    manager: Address,
    distributions: BTreeMap<DistributionId, RewardsDistribution>,
    /// Amount claimed per (distribution, delegator). Present means claimed.
    claims: BTreeMap<(DistributionId, Address), Amount>,
    /// Number of the last claim forwarded from this domain.
    forwarded_claims: u64,
    /// Forwarded claims already paid out here.
    processed_claims: BTreeSet<(ValidatorId, u64)>,
    verifier: V,
}

impl RewardsDistributor<MerkleProofVerifier> {
    /// Create a distributor verifying proofs against binary Blake3 trees.
    pub fn new(local: DomainId, vault: Address, manager: Address) -> Self {
        Self::with_verifier(local, vault, manager, MerkleProofVerifier)
    }
}

impl<V: ProofVerifier> RewardsDistributor<V> {
    /// Create a distributor with a custom proof verifier.
    pub fn with_verifier(local: DomainId, vault: Address, manager: Address, verifier: V) -> Self {
        Self {
            local,
            vault,
            manager,
            distributions: BTreeMap::new(),
            claims: BTreeMap::new(),
            forwarded_claims: 0,
            processed_claims: BTreeSet::new(),
            verifier,
        }
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub fn manager(&self) -> Address {
        self.manager
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Validator rewards
    // ═══════════════════════════════════════════════════════════════════════

    /// Credit `amount` of `asset` to a validator enrolled with `service`.
    ///
    /// The service account pays into the vault first; the balance is only
    /// credited once custody accepts the transfer.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_reward(
        &mut self,
        caller: Address,
        service: ServiceId,
        validator: ValidatorId,
        asset: Asset,
        amount: Amount,
        registry: &ServiceRegistry,
        directory: &mut ValidatorDirectory,
        custody: &mut dyn Custody,
    ) -> Result<Effects, ProtocolError> {
        if amount == 0 {
            return Err(ProtocolError::ZeroAmount);
        }
        let record = registry.authorized(caller, service)?;
        if !record.has_validator(validator) {
            return Err(ProtocolError::NotEnrolled {
                validator,
                service,
                asset,
            });
        }
        let target = directory
            .get_mut(validator)
            .ok_or(ProtocolError::UnknownValidator(validator))?;

        custody.transfer_in(self.vault, caller, asset, amount)?;

        let balance = target.rewards.entry(asset).or_insert(0);
        *balance = balance.saturating_add(amount);

        info!(
            validator = %validator,
            service = %service,
            asset = %asset,
            amount,
            balance = *balance,
            "Reward submitted"
        );
        Ok(Effects::done().emit(Fact::RewardSubmitted {
            validator,
            service,
            asset,
            amount,
        }))
    }

    /// Claim a validator's accrued rewards.
    ///
    /// On the local domain each listed asset's balance is zeroed and split:
    /// the validator portion goes to `recipient`, the delegator portion
    /// opens a distribution. When the balances accrued on another domain the
    /// claim is forwarded there and answered with a confirmation.
    #[allow(clippy::too_many_arguments)]
    pub fn claim_reward(
        &mut self,
        now: Duration,
        caller: Address,
        validator: ValidatorId,
        recipient: Address,
        assets: Vec<Asset>,
        delegator_share: Bips,
        domain: DomainId,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let record = directory.local_record(validator)?;
        if record.operator != caller {
            return Err(ProtocolError::NotOperator { caller, validator });
        }

        if domain != self.local {
            self.forwarded_claims += 1;
            info!(
                validator = %validator,
                destination = %domain,
                share = %delegator_share,
                nonce = self.forwarded_claims,
                "Reward claim forwarded"
            );
            return Ok(Effects::done().send(
                domain,
                CrossDomainMessage::ClaimReward(ClaimRewardRequest {
                    validator,
                    recipient,
                    delegator_share,
                    assets,
                    nonce: self.forwarded_claims,
                }),
            ));
        }

        let payout = self.pay_out(now, validator, recipient, &assets, delegator_share, directory)?;
        Ok(Effects {
            outcome: CommandOutcome::RewardClaimed {
                paid: payout.paid,
                distributions: payout.distributions,
            },
            ..payout.effects
        })
    }

    /// Pay out a claim forwarded by the validator's origin domain.
    ///
    /// Each claim nonce is paid out once; a redelivered claim is rejected
    /// even if new rewards accrued since.
    pub fn handle_incoming_claim(
        &mut self,
        now: Duration,
        from: DomainId,
        request: ClaimRewardRequest,
        directory: &mut ValidatorDirectory,
    ) -> Result<Effects, ProtocolError> {
        let validator = request.validator;
        match directory.get(validator) {
            Some(record) if record.origin == from => {}
            Some(_) => {
                warn!(validator = %validator, from = %from, "Reward claim from wrong origin");
                return Err(ProtocolError::NoValidatorAccount(validator));
            }
            None => return Err(ProtocolError::UnknownValidator(validator)),
        }
        let key = (validator, request.nonce);
        if self.processed_claims.contains(&key) {
            warn!(
                validator = %validator,
                from = %from,
                nonce = request.nonce,
                "Replayed reward claim"
            );
            return Err(ProtocolError::DuplicateClaim {
                validator,
                nonce: request.nonce,
            });
        }

        let payout = self.pay_out(
            now,
            validator,
            request.recipient,
            &request.assets,
            request.delegator_share,
            directory,
        )?;
        self.processed_claims.insert(key);
        Ok(payout.effects.send(
            from,
            CrossDomainMessage::ClaimRewardConfirmed(ClaimRewardConfirmed {
                validator,
                recipient: request.recipient,
                paid: payout.paid,
                distributions: payout.distributions,
            }),
        ))
    }

    /// A remote domain paid out a forwarded claim.
    pub fn handle_claim_confirmed(&self, from: DomainId, message: ClaimRewardConfirmed) -> Effects {
        info!(
            validator = %message.validator,
            from = %from,
            assets = message.paid.len(),
            distributions = message.distributions.len(),
            "Remote reward claim completed"
        );
        Effects::done().emit(Fact::RemoteClaimCompleted {
            validator: message.validator,
            from,
            paid: message.paid,
        })
    }

    /// Zero and split the listed balances of a validator.
    ///
    /// Every distribution id is checked before any balance is touched, so a
    /// failure leaves all balances in place.
    fn pay_out(
        &mut self,
        now: Duration,
        validator: ValidatorId,
        recipient: Address,
        assets: &[Asset],
        delegator_share: Bips,
        directory: &mut ValidatorDirectory,
    ) -> Result<Payout, ProtocolError> {
        let record = directory
            .get_mut(validator)
            .ok_or(ProtocolError::UnknownValidator(validator))?;
        let assets: BTreeSet<Asset> = assets.iter().copied().collect();

        let mut splits = Vec::new();
        for asset in assets {
            let balance = record.rewards.get(&asset).copied().unwrap_or(0);
            if balance == 0 {
                continue;
            }
            let delegator_portion = delegator_share.apply(balance);
            let distribution = (delegator_portion > 0)
                .then(|| RewardsDistribution::open(validator, asset, delegator_portion, now));
            if let Some(d) = &distribution {
                if self.distributions.contains_key(&d.id) {
                    return Err(ProtocolError::DistributionExists(d.id));
                }
            }
            splits.push((asset, balance, balance - delegator_portion, distribution));
        }

        let mut payout = Payout {
            effects: Effects::done(),
            paid: Vec::with_capacity(splits.len()),
            distributions: Vec::new(),
        };
        for (asset, balance, validator_portion, distribution) in splits {
            record.rewards.remove(&asset);

            if validator_portion > 0 {
                payout.effects = payout
                    .effects
                    .settle(Settlement::TransferOut {
                        account: self.vault,
                        to: recipient,
                        asset,
                        amount: validator_portion,
                    })
                    .emit(Fact::RewardClaimed {
                        validator,
                        recipient,
                        asset,
                        amount: validator_portion,
                    });
            }
            payout.paid.push((asset, validator_portion));

            if let Some(distribution) = distribution {
                info!(
                    distribution = %distribution.id,
                    validator = %validator,
                    asset = %asset,
                    total = distribution.total,
                    "Distribution opened"
                );
                payout.effects = payout.effects.emit(Fact::DistributionOpened {
                    id: distribution.id,
                    validator,
                    asset,
                    total: distribution.total,
                });
                payout.distributions.push(distribution.id);
                self.distributions.insert(distribution.id, distribution);
            }

            info!(
                validator = %validator,
                asset = %asset,
                balance,
                paid = validator_portion,
                "Reward claimed"
            );
        }
        Ok(payout)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Delegator distributions
    // ═══════════════════════════════════════════════════════════════════════

    /// Publish the commitment root of a distribution. Manager only, once.
    pub fn set_commitment_root(
        &mut self,
        caller: Address,
        id: DistributionId,
        root: Hash,
    ) -> Result<Effects, ProtocolError> {
        if caller != self.manager {
            return Err(ProtocolError::Unauthorized { caller });
        }
        let distribution = self
            .distributions
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownDistribution(id))?;
        if distribution.commitment_root.is_some() {
            return Err(ProtocolError::RootAlreadySet(id));
        }
        distribution.commitment_root = Some(root);

        info!(distribution = %id, root = %root, "Commitment root set");
        Ok(Effects::done().emit(Fact::CommitmentRootSet { id, root }))
    }

    /// Pay a delegator its committed share of a distribution.
    pub fn claim_delegator_reward(
        &mut self,
        share: DelegatorShare,
        index: u64,
        id: DistributionId,
        proof: &MerkleProof,
    ) -> Result<Effects, ProtocolError> {
        let distribution = self
            .distributions
            .get(&id)
            .ok_or(ProtocolError::UnknownDistribution(id))?;
        let root = distribution
            .commitment_root
            .ok_or(ProtocolError::RootNotSet(id))?;
        let delegator = share.delegator;
        if self.claims.contains_key(&(id, delegator)) {
            return Err(ProtocolError::AlreadyClaimed {
                distribution: id,
                delegator,
            });
        }
        let amount = share.payout(distribution.total);
        if amount == 0 {
            return Err(ProtocolError::NothingToClaim(id));
        }
        let remaining = distribution.total.saturating_sub(self.claimed_total(&id));
        if amount > remaining {
            warn!(
                distribution = %id,
                delegator = %delegator,
                amount,
                remaining,
                "Claim exceeds distribution"
            );
            return Err(ProtocolError::DistributionExhausted {
                distribution: id,
                requested: amount,
                remaining,
            });
        }
        if !self.verifier.verify(proof, &root, &share.leaf_hash(), index) {
            debug!(distribution = %id, delegator = %delegator, index, "Inclusion proof rejected");
            return Err(ProtocolError::InvalidProof(id));
        }
        let asset = distribution.asset;

        self.claims.insert((id, delegator), amount);

        info!(distribution = %id, delegator = %delegator, amount, "Delegator reward claimed");
        Ok(Effects::new(CommandOutcome::DelegatorRewardClaimed { amount })
            .settle(Settlement::TransferOut {
                account: self.vault,
                to: delegator,
                asset,
                amount,
            })
            .emit(Fact::DelegatorRewardClaimed {
                id,
                delegator,
                amount,
            }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Get a distribution.
    pub fn distribution(&self, id: &DistributionId) -> Option<&RewardsDistribution> {
        self.distributions.get(id)
    }

    /// Distributions opened for a validator's delegators.
    pub fn distributions_of(
        &self,
        validator: ValidatorId,
    ) -> impl Iterator<Item = &RewardsDistribution> {
        self.distributions
            .values()
            .filter(move |d| d.validator == validator)
    }

    /// Amount a delegator claimed from a distribution, if it claimed.
    pub fn claimed(&self, id: &DistributionId, delegator: &Address) -> Option<Amount> {
        self.claims.get(&(*id, *delegator)).copied()
    }

    /// Total claimed from a distribution so far.
    pub fn claimed_total(&self, id: &DistributionId) -> Amount {
        self.claims
            .range((*id, Address([0; 20]))..=(*id, Address([0xff; 20])))
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_commitment;
    use tracing_test::traced_test;
    use xstake_core::Action;
    use xstake_test_helpers::{test_address, test_token, TestCustody};
    use xstake_types::SlashPolicy;

    const A: DomainId = DomainId(1);
    const B: DomainId = DomainId(2);
    const SERVICE: ServiceId = ServiceId(10);

    struct Fixture {
        distributor: RewardsDistributor,
        directory: ValidatorDirectory,
        registry: ServiceRegistry,
        custody: TestCustody,
    }

    fn usdc() -> Asset {
        test_token(7)
    }

    fn vault() -> Address {
        test_address(900)
    }

    fn manager() -> Address {
        test_address(901)
    }

    /// Validator 1 on A enrolled with SERVICE for token 1; the service
    /// account holds 10_000 USDC.
    fn fixture() -> Fixture {
        let mut directory = ValidatorDirectory::new(A);
        let mut registry = ServiceRegistry::new(A);
        let mut custody = TestCustody::new();

        directory
            .register_validator(ValidatorId(1), test_address(100), test_address(1))
            .unwrap();
        registry
            .register_service(SERVICE, test_address(50), SlashPolicy::default())
            .unwrap();
        registry.add_member(SERVICE, ValidatorId(1), test_token(1));
        custody.mint(test_address(50), usdc(), 10_000);

        Fixture {
            distributor: RewardsDistributor::new(A, vault(), manager()),
            directory,
            registry,
            custody,
        }
    }

    fn submit(f: &mut Fixture, amount: Amount) -> Result<Effects, ProtocolError> {
        f.distributor.submit_reward(
            test_address(50),
            SERVICE,
            ValidatorId(1),
            usdc(),
            amount,
            &f.registry,
            &mut f.directory,
            &mut f.custody,
        )
    }

    fn claim(f: &mut Fixture, share: u16) -> Result<Effects, ProtocolError> {
        f.distributor.claim_reward(
            Duration::from_secs(5),
            test_address(1),
            ValidatorId(1),
            test_address(2),
            vec![usdc()],
            Bips::saturating(share),
            A,
            &mut f.directory,
        )
    }

    fn apply(f: &mut Fixture, effects: &Effects) {
        for settlement in &effects.settlements {
            settlement.apply(&mut f.custody).unwrap();
        }
    }

    fn balance(f: &Fixture) -> Amount {
        f.directory
            .get(ValidatorId(1))
            .unwrap()
            .rewards
            .get(&usdc())
            .copied()
            .unwrap_or(0)
    }

    #[traced_test]
    #[test]
    fn test_split_with_delegator_share() {
        let mut f = fixture();
        submit(&mut f, 1_000).unwrap();
        assert_eq!(f.custody.balance_of(vault(), usdc()), 1_000);

        let effects = claim(&mut f, 9_000).unwrap();
        apply(&mut f, &effects);

        assert_eq!(f.custody.balance_of(test_address(2), usdc()), 100);
        assert_eq!(balance(&f), 0);

        let CommandOutcome::RewardClaimed { paid, distributions } = effects.outcome else {
            panic!("expected a reward claim");
        };
        assert_eq!(paid, vec![(usdc(), 100)]);
        assert_eq!(distributions.len(), 1);

        let distribution = f.distributor.distribution(&distributions[0]).unwrap();
        assert_eq!(distribution.total, 900);
        assert_eq!(distribution.commitment_root, None);

        let share = DelegatorShare::new(test_address(20), Bips::MAX);
        let result = f.distributor.claim_delegator_reward(
            share,
            0,
            distributions[0],
            &MerkleProof::default(),
        );
        assert_eq!(result, Err(ProtocolError::RootNotSet(distributions[0])));
    }

    #[test]
    fn test_zero_share_pays_everything() {
        let mut f = fixture();
        submit(&mut f, 1_000).unwrap();

        let effects = claim(&mut f, 0).unwrap();
        apply(&mut f, &effects);

        assert_eq!(f.custody.balance_of(test_address(2), usdc()), 1_000);
        assert!(f.distributor.is_empty());
    }

    #[test]
    fn test_rewards_accumulate() {
        let mut f = fixture();
        submit(&mut f, 300).unwrap();
        submit(&mut f, 200).unwrap();
        assert_eq!(balance(&f), 500);
    }

    #[test]
    fn test_submit_guards() {
        let mut f = fixture();
        assert_eq!(submit(&mut f, 0), Err(ProtocolError::ZeroAmount));

        let result = f.distributor.submit_reward(
            test_address(51),
            SERVICE,
            ValidatorId(1),
            usdc(),
            100,
            &f.registry,
            &mut f.directory,
            &mut f.custody,
        );
        assert_eq!(
            result,
            Err(ProtocolError::Unauthorized {
                caller: test_address(51)
            })
        );

        f.directory
            .register_validator(ValidatorId(2), test_address(200), test_address(3))
            .unwrap();
        let result = f.distributor.submit_reward(
            test_address(50),
            SERVICE,
            ValidatorId(2),
            usdc(),
            100,
            &f.registry,
            &mut f.directory,
            &mut f.custody,
        );
        assert!(matches!(result, Err(ProtocolError::NotEnrolled { .. })));

        // Custody refusal leaves the balance untouched.
        assert!(matches!(
            submit(&mut f, 20_000),
            Err(ProtocolError::Custody(_))
        ));
        assert_eq!(balance(&f), 0);
    }

    #[test]
    fn test_delegator_claims_with_proof_once() {
        let mut f = fixture();
        submit(&mut f, 1_000).unwrap();
        let effects = claim(&mut f, 9_000).unwrap();
        apply(&mut f, &effects);
        let id = f.distributor.distributions_of(ValidatorId(1)).next().unwrap().id;

        let shares = vec![
            DelegatorShare::new(test_address(20), Bips::saturating(6_000)),
            DelegatorShare::new(test_address(21), Bips::saturating(4_000)),
        ];
        let commitment = build_commitment(&shares).unwrap();

        assert_eq!(
            f.distributor
                .set_commitment_root(test_address(1), id, commitment.root),
            Err(ProtocolError::Unauthorized {
                caller: test_address(1)
            })
        );
        f.distributor
            .set_commitment_root(manager(), id, commitment.root)
            .unwrap();
        assert_eq!(
            f.distributor.set_commitment_root(manager(), id, Hash::ZERO),
            Err(ProtocolError::RootAlreadySet(id))
        );

        let (proof, index) = commitment.proof(0).unwrap();
        let effects = f
            .distributor
            .claim_delegator_reward(shares[0], index, id, proof)
            .unwrap();
        apply(&mut f, &effects);
        assert_eq!(f.custody.balance_of(test_address(20), usdc()), 540);
        assert_eq!(f.distributor.claimed(&id, &test_address(20)), Some(540));

        let again = f.distributor.claim_delegator_reward(shares[0], index, id, proof);
        assert_eq!(
            again,
            Err(ProtocolError::AlreadyClaimed {
                distribution: id,
                delegator: test_address(20),
            })
        );
        assert_eq!(f.custody.balance_of(test_address(20), usdc()), 540);

        // Right proof, wrong share.
        let (proof, index) = commitment.proof(1).unwrap();
        let inflated = DelegatorShare::new(test_address(21), Bips::saturating(9_000));
        assert_eq!(
            f.distributor.claim_delegator_reward(inflated, index, id, proof),
            Err(ProtocolError::InvalidProof(id))
        );

        let effects = f
            .distributor
            .claim_delegator_reward(shares[1], index, id, proof)
            .unwrap();
        apply(&mut f, &effects);
        assert_eq!(f.distributor.claimed_total(&id), 900);
        assert_eq!(f.custody.balance_of(vault(), usdc()), 0);
    }

    #[traced_test]
    #[test]
    fn test_claims_never_exceed_distribution_total() {
        let mut f = fixture();
        submit(&mut f, 1_000).unwrap();
        let effects = claim(&mut f, 9_000).unwrap();
        apply(&mut f, &effects);
        // Another validator's rewards sit in the same vault.
        f.custody.mint(vault(), usdc(), 5_000);
        let id = f.distributor.distributions_of(ValidatorId(1)).next().unwrap().id;

        // Shares adding up to 150%.
        let shares = vec![
            DelegatorShare::new(test_address(20), Bips::saturating(8_000)),
            DelegatorShare::new(test_address(21), Bips::saturating(7_000)),
        ];
        let commitment = build_commitment(&shares).unwrap();
        f.distributor
            .set_commitment_root(manager(), id, commitment.root)
            .unwrap();

        let (proof, index) = commitment.proof(0).unwrap();
        let effects = f
            .distributor
            .claim_delegator_reward(shares[0], index, id, proof)
            .unwrap();
        apply(&mut f, &effects);
        assert_eq!(f.custody.balance_of(test_address(20), usdc()), 720);

        let (proof, index) = commitment.proof(1).unwrap();
        assert_eq!(
            f.distributor.claim_delegator_reward(shares[1], index, id, proof),
            Err(ProtocolError::DistributionExhausted {
                distribution: id,
                requested: 630,
                remaining: 180,
            })
        );
        assert_eq!(f.distributor.claimed_total(&id), 720);
        assert_eq!(f.distributor.claimed(&id, &test_address(21)), None);
        assert_eq!(f.custody.balance_of(vault(), usdc()), 5_180);
    }

    #[test]
    fn test_claim_requires_operator() {
        let mut f = fixture();
        let result = f.distributor.claim_reward(
            Duration::ZERO,
            test_address(9),
            ValidatorId(1),
            test_address(9),
            vec![usdc()],
            Bips::ZERO,
            A,
            &mut f.directory,
        );
        assert!(matches!(result, Err(ProtocolError::NotOperator { .. })));
    }

    #[test]
    fn test_remote_claim_round_trip() {
        // Origin A forwards; service domain B holds the mirror's balance.
        let mut origin = fixture();
        let mut remote = RewardsDistributor::new(B, vault(), manager());
        let mut remote_directory = ValidatorDirectory::new(B);
        let descriptor = origin
            .directory
            .get(ValidatorId(1))
            .unwrap()
            .descriptor(test_token(1));
        remote_directory
            .upsert_mirror(&descriptor)
            .rewards
            .insert(usdc(), 1_000);

        let effects = origin
            .distributor
            .claim_reward(
                Duration::ZERO,
                test_address(1),
                ValidatorId(1),
                test_address(2),
                vec![usdc(), usdc()],
                Bips::saturating(5_000),
                B,
                &mut origin.directory,
            )
            .unwrap();
        let [Action::SendMessage {
            destination: B,
            message: CrossDomainMessage::ClaimReward(request),
        }] = effects.actions.as_slice()
        else {
            panic!("expected a forwarded claim");
        };

        let reply = remote
            .handle_incoming_claim(Duration::ZERO, A, request.clone(), &mut remote_directory)
            .unwrap();
        assert_eq!(reply.settlements.len(), 1);
        assert_eq!(remote.len(), 1);

        let confirmed = reply
            .actions
            .iter()
            .find_map(|a| match a {
                Action::SendMessage {
                    message: CrossDomainMessage::ClaimRewardConfirmed(m),
                    ..
                } => Some(m.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(confirmed.paid, vec![(usdc(), 500)]);

        // Redelivery after new rewards accrued pays nothing out.
        remote_directory
            .get_mut(ValidatorId(1))
            .unwrap()
            .rewards
            .insert(usdc(), 400);
        assert_eq!(
            remote.handle_incoming_claim(Duration::ZERO, A, request.clone(), &mut remote_directory),
            Err(ProtocolError::DuplicateClaim {
                validator: ValidatorId(1),
                nonce: request.nonce,
            })
        );
        assert_eq!(remote.len(), 1);
        assert_eq!(
            remote_directory.get(ValidatorId(1)).unwrap().rewards.get(&usdc()),
            Some(&400)
        );

        // A new claim from the origin carries a new nonce.
        let effects = origin
            .distributor
            .claim_reward(
                Duration::from_secs(1),
                test_address(1),
                ValidatorId(1),
                test_address(2),
                vec![usdc()],
                Bips::ZERO,
                B,
                &mut origin.directory,
            )
            .unwrap();
        let [Action::SendMessage {
            message: CrossDomainMessage::ClaimReward(second),
            ..
        }] = effects.actions.as_slice()
        else {
            panic!("expected a forwarded claim");
        };
        assert_ne!(second.nonce, request.nonce);
        let reply = remote
            .handle_incoming_claim(Duration::from_secs(1), A, second.clone(), &mut remote_directory)
            .unwrap();
        assert_eq!(reply.settlements.len(), 1);

        let effects = origin.distributor.handle_claim_confirmed(B, confirmed);
        assert!(matches!(
            effects.actions.as_slice(),
            [Action::EmitFact(Fact::RemoteClaimCompleted { .. })]
        ));

        // Only the validator's origin may forward claims.
        assert_eq!(
            remote.handle_incoming_claim(Duration::ZERO, DomainId(3), request.clone(), &mut remote_directory),
            Err(ProtocolError::NoValidatorAccount(ValidatorId(1)))
        );
    }
}
