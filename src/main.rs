// frate-sim: walk one market through a full epoch on the testnet preset and
// print what happens at each step.

use rust_decimal_macros::dec;

use frate_core::{
    AccountId, Amount, EngineConfig, MarketId, OracleId, ProtocolConfig, Rate, Role, Timestamp,
    TokenSide,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let admin = AccountId(1);
    let operator = AccountId(2);
    let alice = AccountId(10);
    let bob = AccountId(11);
    let market = MarketId(1);

    let mut engine = frate_core::Engine::new(
        ProtocolConfig::testnet(),
        EngineConfig::default(),
        admin,
    )?;
    engine.set_time(Timestamp::from_millis(1_000));
    engine.grant_role(admin, operator, Role::Operator)?;
    engine.add_market(admin, market)?;
    engine.add_oracle(admin, market, OracleId(1), 10_000)?;

    println!("=== frate-sim: one epoch, two traders ===\n");

    // fund and mint
    engine.deposit(alice, Amount::new_unchecked(dec!(10_000)))?;
    engine.deposit(bob, Amount::new_unchecked(dec!(10_000)))?;

    let minted = engine.mint(alice, market, Amount::new_unchecked(dec!(1_000)))?;
    println!(
        "alice mints with 1000 collateral: {} of each token, fee {}",
        minted.tokens_minted, minted.fee
    );
    let minted = engine.mint(bob, market, Amount::new_unchecked(dec!(1_000)))?;
    println!(
        "bob mints with 1000 collateral:   {} of each token, fee {}",
        minted.tokens_minted, minted.fee
    );

    // alice seeds the pool, bob takes a directional position
    let liquidity = engine.add_liquidity(
        alice,
        market,
        Amount::new_unchecked(dec!(500)),
        Amount::new_unchecked(dec!(500)),
        Amount::zero(),
    )?;
    println!("\nalice adds 500/500 liquidity, receives {} shares", liquidity.shares);

    engine.advance_block();
    let swap = engine.swap(
        bob,
        market,
        TokenSide::Nfrt,
        Amount::new_unchecked(dec!(100)),
        Amount::zero(),
    )?;
    println!(
        "bob swaps 100 NFRT for {} PFRT (fee {})",
        swap.amount_out, swap.fee
    );
    if let Some(price) = engine.pool(market)?.spot_price() {
        println!("pool price after swap: {} NFRT per PFRT", price.round_dp(6));
    }

    // oracle reports a positive funding rate through the epoch
    for (minutes, rate) in [(10, dec!(0.020)), (30, dec!(0.024)), (50, dec!(0.028))] {
        engine.set_time(Timestamp::from_millis(1_000 + minutes * 60 * 1_000));
        engine.submit_report(operator, market, OracleId(1), Rate::new(rate))?;
        let update = engine.update_funding_rate(operator, market)?;
        println!(
            "t+{minutes}m funding rate update: {} (TWAP {})",
            update.rate,
            update
                .twap_rate
                .map(|r| r.to_string())
                .unwrap_or_else(|| "n/a".into())
        );
    }

    // past the epoch end, settle and distribute
    engine.set_time(Timestamp::from_millis(1_000 + 61 * 60 * 1_000));
    let settlement = engine.settle_epoch(operator, market)?;
    println!(
        "\nepoch {:?} settles at rate {}: {} distributed across {} positions",
        settlement.epoch_id.0, settlement.settlement_rate,
        settlement.total_funding_distributed, settlement.positions_affected
    );

    for (name, account) in [("alice", alice), ("bob", bob)] {
        let claim = engine.claim_funding(account, market, settlement.epoch_id)?;
        println!(
            "{name} claims {}: balance now {}",
            claim.amount, claim.new_balance
        );
    }

    let rollover = engine.start_new_epoch(operator, market)?;
    println!(
        "\nepoch {:?} opens, runs until t={}ms",
        rollover.epoch_id.0,
        rollover.end_time.as_millis()
    );
    println!("{} events recorded", engine.events().len());

    Ok(())
}
