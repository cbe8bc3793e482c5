// scenario suite: full protocol flows through the engine, including the
// mint -> trade -> settle -> claim path, the pause matrix, and guardian quorum.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use frate_core::amm::AmmError;
use frate_core::epoch::EpochError;
use frate_core::ledger::LedgerError;
use frate_core::oracle::OracleError;
use frate_core::{
    AccountId, Amount, Component, EmergencySeverity, Engine, EngineConfig, EngineError, MarketId,
    OracleId, ProtocolConfig, Rate, Role, Timestamp, TokenSide,
};

const ADMIN: AccountId = AccountId(1);
const OPERATOR: AccountId = AccountId(2);
const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(11);
const MARKET: MarketId = MarketId(1);

const HOUR: i64 = 3600 * 1000;

fn amt(v: Decimal) -> Amount {
    Amount::new_unchecked(v)
}

fn testnet_engine() -> Engine {
    let mut engine = Engine::new(
        ProtocolConfig::testnet(),
        EngineConfig::default(),
        ADMIN,
    )
    .unwrap();
    engine.set_time(Timestamp::from_millis(1_000));
    engine.grant_role(ADMIN, OPERATOR, Role::Operator).unwrap();
    engine.add_market(ADMIN, MARKET).unwrap();
    engine.add_oracle(ADMIN, MARKET, OracleId(1), 10_000).unwrap();
    engine
}

#[test]
fn full_epoch_lifecycle() {
    let mut engine = testnet_engine();

    // mint 1000 at 0.1% fee: 999 of each token
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();
    let mint = engine.mint(ALICE, MARKET, amt(dec!(1_000))).unwrap();
    assert_eq!(mint.tokens_minted.value(), dec!(999.000));
    assert_eq!(mint.fee.value(), dec!(1.000));

    let position = engine.position(MARKET, ALICE).unwrap().unwrap();
    assert_eq!(position.pfrt_balance.value(), dec!(999.000));
    assert_eq!(position.nfrt_balance.value(), dec!(999.000));

    // alice seeds the pool with 500/500
    let liquidity = engine
        .add_liquidity(ALICE, MARKET, amt(dec!(500)), amt(dec!(500)), Amount::zero())
        .unwrap();
    assert_eq!(liquidity.shares.value(), dec!(500));

    // bob swaps 10 PFRT; output must match the closed-form 0.3% fee formula
    engine.deposit(BOB, amt(dec!(10_000))).unwrap();
    engine.mint(BOB, MARKET, amt(dec!(1_000))).unwrap();
    engine.advance_block();

    let swap = engine
        .swap(BOB, MARKET, TokenSide::Pfrt, amt(dec!(10)), Amount::zero())
        .unwrap();
    let net_in = dec!(10) * (Decimal::ONE - dec!(0.003));
    let expected_out = dec!(500) * net_in / (dec!(500) + net_in);
    assert_eq!(swap.amount_out.value(), expected_out);

    // funding rate lands at +2.5%, epoch ends, operator settles
    engine
        .submit_report(OPERATOR, MARKET, OracleId(1), Rate::new(dec!(0.025)))
        .unwrap();
    engine.update_funding_rate(OPERATOR, MARKET).unwrap();

    engine.advance_time(HOUR + 1);
    let settlement = engine.settle_epoch(OPERATOR, MARKET).unwrap();
    assert_eq!(settlement.settlement_rate, Rate::new(dec!(0.025)));
    assert_eq!(settlement.positions_affected, 2);

    // two positions means the deltas are exact negations of each other.
    // bob is NFRT-heavy after the swap, so he pays and alice receives.
    let ledger = engine.ledger(MARKET).unwrap();
    let alice_delta = ledger.pending_funding(ALICE, settlement.epoch_id).unwrap();
    let bob_delta = ledger.pending_funding(BOB, settlement.epoch_id).unwrap();
    assert!(alice_delta > Decimal::ZERO);
    assert_eq!(bob_delta, -alice_delta);

    // claims settle against the collateral balances, exactly once
    let alice_before = engine.balance(ALICE);
    let claim = engine.claim_funding(ALICE, MARKET, settlement.epoch_id).unwrap();
    assert_eq!(claim.amount, alice_delta);
    assert_eq!(
        claim.new_balance.value(),
        alice_before.value() + alice_delta
    );

    let bob_before = engine.balance(BOB);
    let claim = engine.claim_funding(BOB, MARKET, settlement.epoch_id).unwrap();
    assert_eq!(claim.amount, bob_delta);
    assert_eq!(claim.new_balance.value(), bob_before.value() + bob_delta);

    // second claim is rejected, nothing moves
    let again = engine.claim_funding(ALICE, MARKET, settlement.epoch_id);
    assert!(matches!(
        again,
        Err(EngineError::Ledger(LedgerError::NothingToClaim { .. }))
    ));

    // roll into epoch 2
    let rollover = engine.start_new_epoch(OPERATOR, MARKET).unwrap();
    assert_eq!(rollover.epoch_id.0, 2);
}

#[test]
fn flash_loan_guard_through_engine() {
    let mut engine = testnet_engine();
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();
    engine.mint(ALICE, MARKET, amt(dec!(2_000))).unwrap();
    engine
        .add_liquidity(ALICE, MARKET, amt(dec!(500)), amt(dec!(500)), Amount::zero())
        .unwrap();

    engine.advance_block();
    engine
        .swap(ALICE, MARKET, TokenSide::Pfrt, amt(dec!(10)), Amount::zero())
        .unwrap();

    let second = engine.swap(ALICE, MARKET, TokenSide::Nfrt, amt(dec!(10)), Amount::zero());
    assert!(matches!(
        second,
        Err(EngineError::Amm(AmmError::FlashLoanDetected(_)))
    ));

    engine.advance_block();
    assert!(engine
        .swap(ALICE, MARKET, TokenSide::Nfrt, amt(dec!(10)), Amount::zero())
        .is_ok());
}

#[test]
fn component_pause_matrix() {
    let mut engine = testnet_engine();
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();
    engine.mint(ALICE, MARKET, amt(dec!(2_000))).unwrap();
    engine
        .add_liquidity(ALICE, MARKET, amt(dec!(500)), amt(dec!(500)), Amount::zero())
        .unwrap();
    engine.advance_block();

    // minting paused: mint blocked, trading unaffected
    engine.pause_component(ADMIN, Component::Minting).unwrap();
    assert!(matches!(
        engine.mint(ALICE, MARKET, amt(dec!(100))),
        Err(EngineError::MintingPaused)
    ));
    assert!(engine
        .swap(ALICE, MARKET, TokenSide::Pfrt, amt(dec!(5)), Amount::zero())
        .is_ok());

    // amm paused: trading blocked
    engine.pause_component(ADMIN, Component::Amm).unwrap();
    engine.advance_block();
    assert!(matches!(
        engine.swap(ALICE, MARKET, TokenSide::Pfrt, amt(dec!(5)), Amount::zero()),
        Err(EngineError::TradingIsPaused)
    ));

    // settlement paused: claims and settles blocked
    engine.pause_component(ADMIN, Component::Settlement).unwrap();
    assert!(matches!(
        engine.settle_epoch(OPERATOR, MARKET),
        Err(EngineError::SettlementPaused)
    ));

    // resumes restore each component independently
    engine.resume_component(ADMIN, Component::Minting).unwrap();
    assert!(engine.mint(ALICE, MARKET, amt(dec!(100))).is_ok());
    assert!(matches!(
        engine.swap(ALICE, MARKET, TokenSide::Pfrt, amt(dec!(5)), Amount::zero()),
        Err(EngineError::TradingIsPaused)
    ));
    engine.resume_component(ADMIN, Component::Amm).unwrap();
    engine.advance_block();
    assert!(engine
        .swap(ALICE, MARKET, TokenSide::Pfrt, amt(dec!(5)), Amount::zero())
        .is_ok());
}

#[test]
fn pool_local_pause_is_independent() {
    let mut engine = testnet_engine();
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();
    engine.mint(ALICE, MARKET, amt(dec!(2_000))).unwrap();
    engine
        .add_liquidity(ALICE, MARKET, amt(dec!(500)), amt(dec!(500)), Amount::zero())
        .unwrap();
    engine.advance_block();

    engine.pause_trading(ADMIN, MARKET).unwrap();
    let result = engine.swap(ALICE, MARKET, TokenSide::Pfrt, amt(dec!(5)), Amount::zero());
    assert!(matches!(
        result,
        Err(EngineError::Amm(AmmError::TradingIsPaused))
    ));

    engine.resume_trading(ADMIN, MARKET).unwrap();
    assert!(engine
        .swap(ALICE, MARKET, TokenSide::Pfrt, amt(dec!(5)), Amount::zero())
        .is_ok());
}

#[test]
fn guardian_quorum_and_cooldown() {
    // default config: quorum of 3, one hour cooldown
    let mut engine = Engine::new(
        ProtocolConfig::default(),
        EngineConfig::default(),
        ADMIN,
    )
    .unwrap();
    engine.set_time(Timestamp::from_millis(1_000));
    engine.add_market(ADMIN, MARKET).unwrap();
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();

    for id in [20u64, 21, 22] {
        engine.add_guardian(ADMIN, AccountId(id)).unwrap();
    }

    let reason = "oracle feed divergence".to_string();
    assert!(engine
        .vote_emergency(AccountId(20), reason.clone(), EmergencySeverity::High)
        .unwrap()
        .is_none());
    assert!(engine
        .vote_emergency(AccountId(21), reason.clone(), EmergencySeverity::High)
        .unwrap()
        .is_none());
    assert!(!engine.emergency().is_global_pause());

    let record = engine
        .vote_emergency(AccountId(22), reason.clone(), EmergencySeverity::High)
        .unwrap()
        .unwrap();
    assert_eq!(record.guardian_votes, 3);
    assert!(engine.emergency().is_global_pause());

    // global pause halts minting
    assert!(matches!(
        engine.mint(ALICE, MARKET, amt(dec!(100))),
        Err(EngineError::MintingPaused)
    ));

    engine
        .deactivate_emergency(ADMIN, "feeds recovered".to_string())
        .unwrap();
    assert!(engine.mint(ALICE, MARKET, amt(dec!(100))).is_ok());

    // cooldown blocks an immediate new vote
    let result = engine.vote_emergency(AccountId(20), reason, EmergencySeverity::High);
    assert!(matches!(
        result,
        Err(EngineError::Emergency(
            frate_core::EmergencyError::CooldownActive { .. }
        ))
    ));
}

#[test]
fn role_checks_on_privileged_operations() {
    let mut engine = testnet_engine();
    let outsider = AccountId(99);

    assert!(matches!(
        engine.add_market(outsider, MarketId(2)),
        Err(EngineError::Role(_))
    ));
    assert!(matches!(
        engine.pause_component(outsider, Component::Amm),
        Err(EngineError::Role(_))
    ));
    assert!(matches!(
        engine.vote_emergency(outsider, "grief".to_string(), EmergencySeverity::Low),
        Err(EngineError::Role(_))
    ));
    assert!(matches!(
        engine.settle_epoch(outsider, MARKET),
        Err(EngineError::Role(_))
    ));
    assert!(matches!(
        engine.submit_report(outsider, MARKET, OracleId(1), Rate::zero()),
        Err(EngineError::Role(_))
    ));
}

#[test]
fn settlement_preconditions() {
    let mut engine = testnet_engine();
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();
    engine.mint(ALICE, MARKET, amt(dec!(1_000))).unwrap();

    // too early
    let early = engine.manual_settlement(ADMIN, MARKET, Rate::new(dec!(0.01)));
    assert!(matches!(
        early,
        Err(EngineError::Epoch(EpochError::EpochStillActive { .. }))
    ));

    // no oracle signal at all
    engine.advance_time(HOUR + 1);
    assert!(matches!(
        engine.settle_epoch(OPERATOR, MARKET),
        Err(EngineError::NoSettlementRate(_))
    ));

    // manual settlement is the escape hatch
    engine.manual_settlement(ADMIN, MARKET, Rate::new(dec!(0.01))).unwrap();

    // and only once
    let again = engine.manual_settlement(ADMIN, MARKET, Rate::new(dec!(0.02)));
    assert!(matches!(
        again,
        Err(EngineError::Epoch(EpochError::AlreadySettled(_)))
    ));
}

#[test]
fn oracle_quorum_through_engine() {
    // default config requires three fresh sources
    let mut engine = Engine::new(
        ProtocolConfig::default(),
        EngineConfig::default(),
        ADMIN,
    )
    .unwrap();
    engine.set_time(Timestamp::from_millis(1_000));
    engine.grant_role(ADMIN, OPERATOR, Role::Operator).unwrap();
    engine.add_market(ADMIN, MARKET).unwrap();
    for id in [1u32, 2, 3] {
        engine.add_oracle(ADMIN, MARKET, OracleId(id), 3_333).unwrap();
    }

    engine
        .submit_report(OPERATOR, MARKET, OracleId(1), Rate::new(dec!(0.01)))
        .unwrap();
    engine
        .submit_report(OPERATOR, MARKET, OracleId(2), Rate::new(dec!(0.02)))
        .unwrap();

    let result = engine.update_funding_rate(OPERATOR, MARKET);
    assert!(matches!(
        result,
        Err(EngineError::Oracle(OracleError::InsufficientOracles {
            required: 3,
            available: 2
        }))
    ));

    engine
        .submit_report(OPERATOR, MARKET, OracleId(3), Rate::new(dec!(0.03)))
        .unwrap();
    let update = engine.update_funding_rate(OPERATOR, MARKET).unwrap();
    assert_eq!(update.rate.value(), dec!(0.02));
    assert_eq!(update.contributing_oracles, 3);
}

#[test]
fn emergency_rate_pins_settlement() {
    let mut engine = testnet_engine();
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();
    engine.mint(ALICE, MARKET, amt(dec!(1_000))).unwrap();

    engine
        .emergency_set_rate(ADMIN, MARKET, Rate::new(dec!(-0.04)))
        .unwrap();

    // normal aggregation is suspended while pinned
    engine
        .submit_report(OPERATOR, MARKET, OracleId(1), Rate::new(dec!(0.01)))
        .unwrap();
    assert!(matches!(
        engine.update_funding_rate(OPERATOR, MARKET),
        Err(EngineError::Oracle(OracleError::EmergencyModeActive))
    ));

    engine.advance_time(HOUR + 1);
    let settlement = engine.settle_epoch(OPERATOR, MARKET).unwrap();
    assert_eq!(settlement.settlement_rate, Rate::new(dec!(-0.04)));

    engine.clear_emergency_rate(ADMIN, MARKET).unwrap();
    assert!(!engine.oracle(MARKET).unwrap().is_emergency());
}

#[test]
fn one_sided_redemption_window() {
    let mut engine = testnet_engine();
    for account in [ALICE, BOB] {
        engine.deposit(account, amt(dec!(10_000))).unwrap();
        engine.mint(account, MARKET, amt(dec!(1_000))).unwrap();
    }

    // closed while the epoch is active
    let early = engine.redeem(ALICE, MARKET, amt(dec!(100)), Amount::zero());
    assert!(matches!(early, Err(EngineError::RedemptionWindowClosed)));

    engine.advance_time(HOUR + 1);
    engine.manual_settlement(ADMIN, MARKET, Rate::new(dec!(0.025))).unwrap();

    // positive rate: PFRT redeems alone, NFRT does not
    let wrong_side = engine.redeem(ALICE, MARKET, Amount::zero(), amt(dec!(100)));
    assert!(matches!(
        wrong_side,
        Err(EngineError::NotWinningSide(TokenSide::Nfrt))
    ));

    let redeemed = engine
        .redeem(ALICE, MARKET, amt(dec!(100)), Amount::zero())
        .unwrap();
    assert_eq!(redeemed.collateral_released.value(), dec!(100));

    // window closes when the next epoch opens
    engine.start_new_epoch(OPERATOR, MARKET).unwrap();
    let closed = engine.redeem(ALICE, MARKET, amt(dec!(100)), Amount::zero());
    assert!(matches!(closed, Err(EngineError::RedemptionWindowClosed)));
}

#[test]
fn unclaimed_funding_survives_rollover() {
    let mut engine = testnet_engine();
    for account in [ALICE, BOB] {
        engine.deposit(account, amt(dec!(10_000))).unwrap();
        engine.mint(account, MARKET, amt(dec!(1_000))).unwrap();
    }
    engine
        .transfer_tokens(ALICE, MARKET, BOB, TokenSide::Nfrt, amt(dec!(999)))
        .unwrap();
    engine
        .transfer_tokens(BOB, MARKET, ALICE, TokenSide::Pfrt, amt(dec!(999)))
        .unwrap();

    engine.advance_time(HOUR + 1);
    let settlement = engine.manual_settlement(ADMIN, MARKET, Rate::new(dec!(0.01))).unwrap();
    engine.start_new_epoch(OPERATOR, MARKET).unwrap();

    // claim from the prior epoch still works after rollover
    let claim = engine.claim_funding(ALICE, MARKET, settlement.epoch_id).unwrap();
    assert_eq!(claim.amount, dec!(0.01) * dec!(1998));
}

#[test]
fn negative_claim_requires_covering_balance() {
    let mut engine = testnet_engine();
    for account in [ALICE, BOB] {
        engine.deposit(account, amt(dec!(10_000))).unwrap();
        engine.mint(account, MARKET, amt(dec!(1_000))).unwrap();
    }
    engine
        .transfer_tokens(ALICE, MARKET, BOB, TokenSide::Nfrt, amt(dec!(999)))
        .unwrap();
    engine
        .transfer_tokens(BOB, MARKET, ALICE, TokenSide::Pfrt, amt(dec!(999)))
        .unwrap();

    engine.advance_time(HOUR + 1);
    let settlement = engine.manual_settlement(ADMIN, MARKET, Rate::new(dec!(0.01))).unwrap();

    // bob holds all NFRT and owes 0.01 * 1998; drain his free balance first
    engine.withdraw(BOB, amt(dec!(9_000))).unwrap();
    let short = engine.claim_funding(BOB, MARKET, settlement.epoch_id);
    assert!(matches!(
        short,
        Err(EngineError::InsufficientBalance { .. })
    ));

    // the failed claim leaves the pending entry intact; funding it pays the debt
    engine.deposit(BOB, amt(dec!(20))).unwrap();
    let claim = engine.claim_funding(BOB, MARKET, settlement.epoch_id).unwrap();
    assert_eq!(claim.amount, dec!(-19.98));
    assert_eq!(claim.new_balance.value(), dec!(0.02));

    // consumed on success
    assert!(matches!(
        engine.claim_funding(BOB, MARKET, settlement.epoch_id),
        Err(EngineError::Ledger(LedgerError::NothingToClaim { .. }))
    ));
}

#[test]
fn parameter_updates_validate_and_take_effect() {
    let mut engine = testnet_engine();
    engine.deposit(ALICE, amt(dec!(10_000))).unwrap();
    engine.mint(ALICE, MARKET, amt(dec!(2_000))).unwrap();
    engine
        .add_liquidity(ALICE, MARKET, amt(dec!(500)), amt(dec!(500)), Amount::zero())
        .unwrap();

    // non-admin setters are rejected
    let mut amm = engine.config().amm.clone();
    amm.max_trade_size = amt(dec!(50));
    assert!(matches!(
        engine.update_amm_parameters(ALICE, amm.clone()),
        Err(EngineError::Role(_))
    ));

    // a slippage bound above 10% fails validation and leaves the config alone
    let mut bad = amm.clone();
    bad.max_slippage_bps = frate_core::Bps::new(1500);
    assert!(matches!(
        engine.update_amm_parameters(ADMIN, bad),
        Err(EngineError::Config(_))
    ));
    assert_eq!(engine.config().amm.max_trade_size.value(), dec!(100_000));

    // a valid update is enforced on the next trade
    engine.update_amm_parameters(ADMIN, amm).unwrap();
    engine.advance_block();
    let result = engine.swap(
        ALICE,
        MARKET,
        TokenSide::Pfrt,
        amt(dec!(100)),
        Amount::zero(),
    );
    assert!(matches!(
        result,
        Err(EngineError::Amm(AmmError::TradeTooLarge { .. }))
    ));

    // oracle setters follow the same path: TWAP windows under 5 minutes fail
    let mut oracle = engine.config().oracle.clone();
    oracle.twap_window_ms = 60 * 1000;
    assert!(matches!(
        engine.update_oracle_parameters(ADMIN, oracle.clone()),
        Err(EngineError::Config(_))
    ));

    oracle.twap_window_ms = 30 * 60 * 1000;
    oracle.min_oracles = 2;
    engine.update_oracle_parameters(ADMIN, oracle).unwrap();

    // with the floor raised to 2, a single fresh report no longer aggregates
    engine
        .submit_report(OPERATOR, MARKET, OracleId(1), Rate::new(dec!(0.01)))
        .unwrap();
    assert!(matches!(
        engine.update_funding_rate(OPERATOR, MARKET),
        Err(EngineError::Oracle(OracleError::InsufficientOracles { .. }))
    ));

    // emergency setters too: quorum above 10 fails, non-admin fails
    let mut emergency = engine.config().emergency.clone();
    emergency.required_votes = 11;
    assert!(matches!(
        engine.update_emergency_parameters(ADMIN, emergency.clone()),
        Err(EngineError::Config(_))
    ));
    emergency.required_votes = 2;
    assert!(matches!(
        engine.update_emergency_parameters(ALICE, emergency.clone()),
        Err(EngineError::Role(_))
    ));

    // raising the quorum from 1 to 2 means a single vote no longer activates
    engine.update_emergency_parameters(ADMIN, emergency).unwrap();
    engine.add_guardian(ADMIN, ALICE).unwrap();
    engine.add_guardian(ADMIN, BOB).unwrap();
    let first = engine
        .vote_emergency(ALICE, "pin drift".to_string(), EmergencySeverity::High)
        .unwrap();
    assert!(first.is_none());
    let second = engine
        .vote_emergency(BOB, "pin drift".to_string(), EmergencySeverity::High)
        .unwrap();
    assert!(second.is_some());
}
