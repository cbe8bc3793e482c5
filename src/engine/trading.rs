// AMM operations. the engine moves tokens between positions and pool reserves;
// the pool itself only prices trades and keeps its guards.
//
// ordering rule for atomicity: validate token balances first, then run the pool
// operation (which validates and mutates), then move balances; the balance moves
// cannot fail after the upfront checks, so a rejected trade changes nothing.

use crate::config::AmmConfig;
use crate::emergency::Component;
use crate::events::{
    EventPayload, LiquidityAddedEvent, LiquidityRemovedEvent, SwapExecutedEvent,
    TradingPausedEvent, TradingResumedEvent,
};
use crate::ledger::LedgerError;
use crate::roles::Role;
use crate::types::{AccountId, Amount, MarketId, TokenSide};

use super::core::Engine;
use super::results::{EngineError, LiquidityResult, SwapResult};

impl Engine {
    pub fn add_liquidity(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        pfrt_amount: Amount,
        nfrt_amount: Amount,
        min_liquidity_out: Amount,
    ) -> Result<LiquidityResult, EngineError> {
        if self.emergency.is_halted(Component::Amm) {
            return Err(EngineError::TradingIsPaused);
        }

        let market = self.market_mut(market_id)?;

        let position = market
            .ledger
            .position(caller)
            .ok_or(LedgerError::UnknownPosition(caller))?;
        for (side, amount) in [(TokenSide::Pfrt, pfrt_amount), (TokenSide::Nfrt, nfrt_amount)] {
            if position.balance(side) < amount {
                return Err(LedgerError::InsufficientTokens {
                    side,
                    required: amount,
                    available: position.balance(side),
                }
                .into());
            }
        }

        let shares = market
            .pool
            .add_liquidity(caller, pfrt_amount, nfrt_amount, min_liquidity_out)?;
        market.ledger.debit_tokens(caller, TokenSide::Pfrt, pfrt_amount)?;
        market.ledger.debit_tokens(caller, TokenSide::Nfrt, nfrt_amount)?;

        self.emit(EventPayload::LiquidityAdded(LiquidityAddedEvent {
            market_id,
            account_id: caller,
            pfrt_amount,
            nfrt_amount,
            liquidity_minted: shares,
        }));

        Ok(LiquidityResult {
            shares,
            pfrt_amount,
            nfrt_amount,
        })
    }

    pub fn remove_liquidity(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        pfrt_amount: Amount,
        nfrt_amount: Amount,
    ) -> Result<LiquidityResult, EngineError> {
        if self.emergency.is_halted(Component::Amm) {
            return Err(EngineError::TradingIsPaused);
        }

        let market = self.market_mut(market_id)?;
        let burned = market
            .pool
            .remove_liquidity(caller, pfrt_amount, nfrt_amount)?;
        market.ledger.credit_tokens(caller, TokenSide::Pfrt, pfrt_amount);
        market.ledger.credit_tokens(caller, TokenSide::Nfrt, nfrt_amount);

        self.emit(EventPayload::LiquidityRemoved(LiquidityRemovedEvent {
            market_id,
            account_id: caller,
            pfrt_amount,
            nfrt_amount,
            liquidity_burned: burned,
        }));

        Ok(LiquidityResult {
            shares: burned,
            pfrt_amount,
            nfrt_amount,
        })
    }

    pub fn swap(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        token_in: TokenSide,
        amount_in: Amount,
        min_amount_out: Amount,
    ) -> Result<SwapResult, EngineError> {
        if self.emergency.is_halted(Component::Amm) {
            return Err(EngineError::TradingIsPaused);
        }

        let amm_config = self.config.amm.clone();
        let now = self.now();
        let block = self.current_block();

        let market = self.market_mut(market_id)?;

        let held = market
            .ledger
            .position(caller)
            .map(|p| p.balance(token_in))
            .unwrap_or_default();
        if held < amount_in {
            return Err(LedgerError::InsufficientTokens {
                side: token_in,
                required: amount_in,
                available: held,
            }
            .into());
        }

        let outcome = market.pool.swap(
            caller,
            token_in,
            amount_in,
            min_amount_out,
            block,
            now,
            &amm_config,
        )?;

        market.ledger.debit_tokens(caller, token_in, amount_in)?;
        market
            .ledger
            .credit_tokens(caller, token_in.opposite(), outcome.amount_out);

        self.emit(EventPayload::SwapExecuted(SwapExecutedEvent {
            market_id,
            account_id: caller,
            token_in,
            amount_in,
            amount_out: outcome.amount_out,
            fee: outcome.fee,
            block,
        }));

        Ok(SwapResult {
            amount_out: outcome.amount_out,
            fee: outcome.fee,
        })
    }

    // pool-local pause, independent of the emergency component flag. either halts trading.
    pub fn pause_trading(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        self.market_mut(market_id)?.pool.pause();
        self.emit(EventPayload::TradingPaused(TradingPausedEvent {
            market_id,
            by: caller,
        }));
        Ok(())
    }

    pub fn resume_trading(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        self.market_mut(market_id)?.pool.resume();
        self.emit(EventPayload::TradingResumed(TradingResumedEvent {
            market_id,
            by: caller,
        }));
        Ok(())
    }

    // live parameter updates go through the same validation as construction,
    // so a bad setter call can never leave the engine with a config that
    // Engine::new would have rejected.
    pub fn update_amm_parameters(
        &mut self,
        caller: AccountId,
        amm: AmmConfig,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        let mut candidate = self.config.clone();
        candidate.amm = amm;
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }
}
