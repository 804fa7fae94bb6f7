//! End-to-end scenarios across several in-process domains.

use std::time::Duration;
use tracing_test::traced_test;
use xstake_core::{Command, CommandOutcome, CrossDomainMessage, Fact, ProtocolError};
use xstake_messages::EnrollConfirmed;
use xstake_node::DomainConfig;
use xstake_rewards::build_commitment;
use xstake_simulation::{NetworkConfig, RecordedFact, SimulationRunner};
use xstake_test_helpers::{bips, test_address, test_token};
use xstake_types::{
    Amount, Asset, Bips, CorrelationId, DelegationId, DelegatorShare, DomainId, OperationKind,
    ServiceId, Severity, SlashPolicy, ValidatorId,
};

const A: DomainId = DomainId(1);
const B: DomainId = DomainId(2);
const C: DomainId = DomainId(3);
const SERVICE: ServiceId = ServiceId(10);
const VALIDATOR: ValidatorId = ValidatorId(1);
const OPERATOR: u64 = 1;
const CUSTODY: u64 = 100;
const SERVICE_ACCOUNT: u64 = 50;
const DAY: Duration = Duration::from_secs(86_400);
const DETACH_DELAY: Duration = Duration::from_secs(3_600);

// ═══════════════════════════════════════════════════════════════════════════
// Fixtures
// ═══════════════════════════════════════════════════════════════════════════

fn runner(network: NetworkConfig, seed: u64) -> SimulationRunner {
    let mut runner = SimulationRunner::new(network, seed);
    for domain in [A, B, C] {
        runner.add_domain(DomainConfig::new(domain).with_detach_delay(DETACH_DELAY));
    }
    runner
}

/// Run a command now and return its result. Messages it sends stay in flight.
fn call(
    runner: &mut SimulationRunner,
    domain: DomainId,
    caller: u64,
    command: Command,
) -> Result<CommandOutcome, ProtocolError> {
    let request = runner.submit(domain, test_address(caller), command);
    runner.run_until(runner.now());
    runner
        .result(request)
        .cloned()
        .expect("command was answered")
}

fn ok(
    runner: &mut SimulationRunner,
    domain: DomainId,
    caller: u64,
    command: Command,
) -> CommandOutcome {
    call(runner, domain, caller, command).expect("command succeeds")
}

/// Let in-flight messages arrive.
fn settle(runner: &mut SimulationRunner) {
    runner.run_for(Duration::from_secs(5));
}

/// Validator 1 on `domain`, bonded 10_000 of `asset`.
fn with_validator(runner: &mut SimulationRunner, domain: DomainId, asset: Asset) {
    runner
        .custody_mut(domain)
        .unwrap()
        .mint(test_address(OPERATOR), asset, 10_000);
    ok(
        runner,
        domain,
        OPERATOR,
        Command::RegisterValidator {
            validator: VALIDATOR,
            custody: test_address(CUSTODY),
            operator: test_address(OPERATOR),
        },
    );
    ok(
        runner,
        domain,
        OPERATOR,
        Command::Bond {
            validator: VALIDATOR,
            asset,
            amount: 10_000,
        },
    );
}

fn with_service(runner: &mut SimulationRunner, domain: DomainId, service: ServiceId) {
    ok(
        runner,
        domain,
        SERVICE_ACCOUNT,
        Command::RegisterService {
            service,
            account: test_address(SERVICE_ACCOUNT),
            policy: SlashPolicy::default(),
        },
    );
}

fn enroll(
    runner: &mut SimulationRunner,
    service: ServiceId,
    domain: DomainId,
    asset: Asset,
) -> Result<CommandOutcome, ProtocolError> {
    call(
        runner,
        A,
        OPERATOR,
        Command::Enroll {
            service,
            domain,
            validator: VALIDATOR,
            asset,
        },
    )
}

fn slash(runner: &mut SimulationRunner, domain: DomainId, value: u16) -> CommandOutcome {
    ok(
        runner,
        domain,
        SERVICE_ACCOUNT,
        Command::Slash {
            service: SERVICE,
            validator: VALIDATOR,
            asset: test_token(1),
            severity: Severity::Hard,
            bips: bips(value),
            reason: "double sign".to_string(),
        },
    )
}

fn delegate(runner: &mut SimulationRunner, delegator: u64, amount: Amount) -> DelegationId {
    runner
        .custody_mut(A)
        .unwrap()
        .mint(test_address(delegator), test_token(1), amount);
    let outcome = ok(
        runner,
        A,
        delegator,
        Command::Delegate {
            validator: VALIDATOR,
            asset: test_token(1),
            amount,
        },
    );
    let CommandOutcome::Delegated(id) = outcome else {
        panic!("expected a delegation id, got {outcome:?}");
    };
    id
}

fn count(runner: &SimulationRunner, domain: DomainId, pred: impl Fn(&Fact) -> bool) -> usize {
    runner.facts_for(domain).filter(|f| pred(f)).count()
}

fn is_enrolled(runner: &SimulationRunner, asset: &Asset) -> bool {
    runner
        .domain(A)
        .unwrap()
        .directory()
        .is_enrolled(VALIDATOR, SERVICE, asset)
}

// ═══════════════════════════════════════════════════════════════════════════
// Delegation
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_refund_is_reduced_only_by_prior_slashes() {
    let mut runner = runner(NetworkConfig::default(), 1);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, A, SERVICE);
    assert_eq!(
        enroll(&mut runner, SERVICE, A, test_token(1)),
        Ok(CommandOutcome::Enrolled)
    );

    let early = delegate(&mut runner, 10, 1_000);

    runner.run_until(Duration::from_secs(5));
    slash(&mut runner, A, 1_000);

    // Created after the slash, so untouched by it.
    runner.run_until(Duration::from_secs(6));
    let late = delegate(&mut runner, 11, 1_000);

    runner.run_until(Duration::from_secs(10));
    for (delegator, id, expected) in [(10, early, 900), (11, late, 1_000)] {
        assert_eq!(
            ok(&mut runner, A, delegator, Command::InitiateRefund { delegation: id }),
            CommandOutcome::RefundInitiated {
                refundable: expected,
                unlock_at: Duration::from_secs(10) + DAY,
            }
        );
    }

    // A slash after initiation does not change the refundable amount.
    runner.run_until(Duration::from_secs(20));
    slash(&mut runner, A, 1_000);

    runner.run_until(Duration::from_secs(10) + DAY - Duration::from_secs(1));
    assert!(matches!(
        call(&mut runner, A, 10, Command::Refund { delegation: early }),
        Err(ProtocolError::TimelockNotElapsed { .. })
    ));

    runner.run_until(Duration::from_secs(10) + DAY);
    assert_eq!(
        ok(&mut runner, A, 10, Command::Refund { delegation: early }),
        CommandOutcome::Refunded { amount: 900 }
    );
    assert_eq!(
        ok(&mut runner, A, 11, Command::Refund { delegation: late }),
        CommandOutcome::Refunded { amount: 1_000 }
    );
    assert_eq!(
        call(&mut runner, A, 10, Command::Refund { delegation: early }),
        Err(ProtocolError::AlreadyRefunded(early))
    );

    let custody = runner.domain(A).unwrap().custody();
    assert_eq!(custody.balance_of(test_address(10), test_token(1)), 900);
    assert_eq!(custody.balance_of(test_address(11), test_token(1)), 1_000);
    assert_eq!(runner.stats().settlement_failures, 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Enrollment
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_cross_domain_enrollment_round_trip() {
    let mut runner = runner(NetworkConfig::default(), 2);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, B, SERVICE);

    let outcome = enroll(&mut runner, SERVICE, B, test_token(1)).unwrap();
    let CommandOutcome::Pending(correlation) = outcome else {
        panic!("expected a pending enrollment, got {outcome:?}");
    };
    assert_eq!(
        correlation,
        CorrelationId::derive(OperationKind::Enroll, VALIDATOR, SERVICE, &test_token(1))
    );
    assert!(!is_enrolled(&runner, &test_token(1)));
    assert_eq!(
        enroll(&mut runner, SERVICE, B, test_token(1)),
        Err(ProtocolError::EnrollmentAlreadyPending {
            validator: VALIDATOR,
            service: SERVICE,
            asset: test_token(1),
        })
    );

    settle(&mut runner);

    assert!(is_enrolled(&runner, &test_token(1)));
    assert!(runner.domain(A).unwrap().enrollment().pending().is_empty());
    let service = runner.domain(B).unwrap().registry().get(SERVICE).unwrap();
    assert!(service.has_member(VALIDATOR, &test_token(1)));
    assert_eq!(runner.stats().messages_sent, 2);
    assert_eq!(runner.stats().messages_delivered, 2);
}

#[traced_test]
#[test]
fn test_eligibility_requirements() {
    let mut runner = runner(NetworkConfig::default(), 3);
    let token_a = test_token(1);
    let token_b = test_token(2);
    with_validator(&mut runner, A, token_b);
    with_service(&mut runner, B, SERVICE);
    ok(
        &mut runner,
        B,
        SERVICE_ACCOUNT,
        Command::SetRequirement {
            service: SERVICE,
            token: token_a,
            chain: A,
            minimum: 100,
        },
    );

    // Only token A qualifies, so 10_000 of token B does not.
    enroll(&mut runner, SERVICE, B, token_b).unwrap();
    settle(&mut runner);
    assert!(!is_enrolled(&runner, &token_b));
    assert_eq!(
        count(&runner, A, |f| matches!(
            f,
            Fact::EnrollmentFailed { reason, .. } if reason == "Ineligible"
        )),
        1
    );
    assert!(runner.domain(A).unwrap().enrollment().pending().is_empty());

    // An empty table admits everyone.
    let open = ServiceId(11);
    ok(
        &mut runner,
        B,
        51,
        Command::RegisterService {
            service: open,
            account: test_address(51),
            policy: SlashPolicy::default(),
        },
    );
    enroll(&mut runner, open, B, token_b).unwrap();
    settle(&mut runner);
    assert!(runner
        .domain(A)
        .unwrap()
        .directory()
        .is_enrolled(VALIDATOR, open, &token_b));
}

#[traced_test]
#[test]
fn test_replayed_confirmation_is_rejected() {
    let mut runner = runner(NetworkConfig::default(), 4);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, B, SERVICE);
    enroll(&mut runner, SERVICE, B, test_token(1)).unwrap();
    settle(&mut runner);
    assert!(is_enrolled(&runner, &test_token(1)));

    let replay = CrossDomainMessage::EnrollConfirmed(EnrollConfirmed {
        correlation: CorrelationId::derive(
            OperationKind::Enroll,
            VALIDATOR,
            SERVICE,
            &test_token(1),
        ),
        service: SERVICE,
        validator: VALIDATOR,
        asset: test_token(1),
    });
    runner.inject(B, A, &replay).unwrap();
    settle(&mut runner);

    let record = runner.domain(A).unwrap().directory().get(VALIDATOR).unwrap();
    assert_eq!(record.enrollments.get(&test_token(1)).map(|s| s.len()), Some(1));
    assert_eq!(
        count(&runner, A, |f| matches!(f, Fact::EnrollmentConfirmed { .. })),
        1
    );
}

#[traced_test]
#[test]
fn test_unanswered_enrollment_stays_pending() {
    let mut runner = runner(NetworkConfig::default(), 5);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, B, SERVICE);
    runner.network_mut().partition(A, B);

    enroll(&mut runner, SERVICE, B, test_token(1)).unwrap();
    settle(&mut runner);
    assert_eq!(runner.stats().messages_dropped, 1);

    runner.run_for(Duration::from_secs(2 * 60 * 60));
    let a = runner.domain(A).unwrap();
    assert_eq!(a.stale_operations().len(), 1);
    assert_eq!(a.enrollment().pending().len(), 1);
    assert!(!is_enrolled(&runner, &test_token(1)));
}

// ═══════════════════════════════════════════════════════════════════════════
// Detachment
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_detachment_failure_and_completion() {
    let mut runner = runner(NetworkConfig::default(), 6);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, B, SERVICE);
    enroll(&mut runner, SERVICE, B, test_token(1)).unwrap();
    settle(&mut runner);

    let initiate = |domain| Command::InitiateDetach {
        service: SERVICE,
        domain,
        validator: VALIDATOR,
        asset: test_token(1),
    };
    let execute = Command::ExecuteDetach {
        service: SERVICE,
        validator: VALIDATOR,
        asset: test_token(1),
    };

    // C does not host the service.
    ok(&mut runner, A, OPERATOR, initiate(C));
    settle(&mut runner);
    assert_eq!(
        count(&runner, A, |f| matches!(
            f,
            Fact::DetachFailed { reason, .. } if reason == "InvalidAVS"
        )),
        1
    );
    assert!(runner.domain(A).unwrap().detachment().pending().is_empty());
    assert!(is_enrolled(&runner, &test_token(1)));

    ok(&mut runner, A, OPERATOR, initiate(B));
    settle(&mut runner);
    assert!(matches!(
        call(&mut runner, A, OPERATOR, execute.clone()),
        Err(ProtocolError::TimelockNotElapsed { .. })
    ));

    runner.run_for(DETACH_DELAY);
    assert!(matches!(
        ok(&mut runner, A, OPERATOR, execute),
        CommandOutcome::Pending(_)
    ));
    settle(&mut runner);

    assert!(!is_enrolled(&runner, &test_token(1)));
    assert!(runner.domain(A).unwrap().detachment().pending().is_empty());
    assert_eq!(
        count(&runner, A, |f| matches!(f, Fact::DetachCompleted { .. })),
        1
    );
    let service = runner.domain(B).unwrap().registry().get(SERVICE).unwrap();
    assert!(!service.has_member(VALIDATOR, &test_token(1)));
}

// ═══════════════════════════════════════════════════════════════════════════
// Slashing
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_duplicated_slash_notice_applies_once() {
    let network = NetworkConfig::default().with_duplicate_rate(1.0);
    let mut runner = runner(network, 7);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, B, SERVICE);
    enroll(&mut runner, SERVICE, B, test_token(1)).unwrap();
    settle(&mut runner);
    assert!(is_enrolled(&runner, &test_token(1)));

    let outcome = slash(&mut runner, B, 1_000);
    assert!(matches!(outcome, CommandOutcome::Slashed { amount: 1_000, .. }));
    settle(&mut runner);

    let a = runner.domain(A).unwrap();
    assert_eq!(a.slashing().len(), 1);
    assert_eq!(
        a.custody().slashed_of(test_address(CUSTODY), test_token(1)),
        1_000
    );
    assert_eq!(a.directory().total_stake(VALIDATOR, &test_token(1)), 9_000);
    assert!(runner.stats().messages_duplicated > 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Rewards
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_reward_split_and_delegator_payout() {
    let mut runner = runner(NetworkConfig::default(), 8);
    let usdc = test_token(9);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, A, SERVICE);
    enroll(&mut runner, SERVICE, A, test_token(1)).unwrap();

    runner
        .custody_mut(A)
        .unwrap()
        .mint(test_address(SERVICE_ACCOUNT), usdc, 1_000);
    ok(
        &mut runner,
        A,
        SERVICE_ACCOUNT,
        Command::SubmitReward {
            service: SERVICE,
            validator: VALIDATOR,
            asset: usdc,
            amount: 1_000,
        },
    );

    let outcome = ok(
        &mut runner,
        A,
        OPERATOR,
        Command::ClaimReward {
            validator: VALIDATOR,
            recipient: test_address(2),
            assets: vec![usdc],
            delegator_share: Bips::saturating(9_000),
            domain: A,
        },
    );
    let CommandOutcome::RewardClaimed { paid, distributions } = outcome else {
        panic!("expected a local claim, got {outcome:?}");
    };
    assert_eq!(paid, vec![(usdc, 100)]);
    let [distribution] = distributions.as_slice() else {
        panic!("expected one distribution");
    };
    let distribution = *distribution;
    assert_eq!(
        runner
            .domain(A)
            .unwrap()
            .custody()
            .balance_of(test_address(2), usdc),
        100
    );

    let shares = vec![
        DelegatorShare::new(test_address(20), Bips::saturating(6_000)),
        DelegatorShare::new(test_address(21), Bips::saturating(4_000)),
    ];
    let commitment = build_commitment(&shares).unwrap();
    let (proof, index) = commitment.proof(0).unwrap();
    let claim = Command::ClaimDelegatorReward {
        share: shares[0],
        index,
        distribution,
        proof: proof.clone(),
    };

    assert_eq!(
        call(&mut runner, A, 20, claim.clone()),
        Err(ProtocolError::RootNotSet(distribution))
    );

    let manager = DomainConfig::new(A).distribution_manager;
    let request = runner.submit(
        A,
        manager,
        Command::SetCommitmentRoot {
            distribution,
            root: commitment.root,
        },
    );
    runner.run_until(runner.now());
    assert_eq!(runner.result(request), Some(&Ok(CommandOutcome::Done)));

    assert_eq!(
        ok(&mut runner, A, 20, claim.clone()),
        CommandOutcome::DelegatorRewardClaimed { amount: 540 }
    );
    assert_eq!(
        call(&mut runner, A, 20, claim),
        Err(ProtocolError::AlreadyClaimed {
            distribution,
            delegator: test_address(20),
        })
    );
    assert_eq!(
        runner
            .domain(A)
            .unwrap()
            .custody()
            .balance_of(test_address(20), usdc),
        540
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Determinism
// ═══════════════════════════════════════════════════════════════════════════

fn jittery_scenario(seed: u64) -> Vec<RecordedFact> {
    let network = NetworkConfig::default()
        .with_jitter(0.5)
        .with_duplicate_rate(0.3);
    let mut runner = runner(network, seed);
    with_validator(&mut runner, A, test_token(1));
    with_service(&mut runner, B, SERVICE);
    with_service(&mut runner, C, ServiceId(11));
    enroll(&mut runner, SERVICE, B, test_token(1)).unwrap();
    enroll(&mut runner, ServiceId(11), C, test_token(1)).unwrap();
    settle(&mut runner);
    slash(&mut runner, B, 500);
    settle(&mut runner);
    runner.facts().to_vec()
}

#[test]
fn test_same_seed_same_history() {
    let first = jittery_scenario(42);
    let second = jittery_scenario(42);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}
