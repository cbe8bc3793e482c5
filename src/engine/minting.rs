// minting, redemption, margin, and token transfers. every entry point checks
// the emergency flags first, then validates against the ledger, then commits.

use crate::emergency::Component;
use crate::epoch::EpochStatus;
use crate::events::{
    EventPayload, MarginAddedEvent, MintCompletedEvent, RedeemCompletedEvent,
    TokensTransferredEvent,
};
use crate::types::{AccountId, Amount, MarketId, TokenSide};

use super::core::Engine;
use super::results::{EngineError, MintResult, RedeemResult};

impl Engine {
    // deposit collateral, receive the pair net of fee
    pub fn mint(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        collateral: Amount,
    ) -> Result<MintResult, EngineError> {
        if self.emergency.is_halted(Component::Minting) {
            return Err(EngineError::MintingPaused);
        }

        let available = self.balance(caller);
        if available < collateral {
            return Err(EngineError::InsufficientBalance {
                required: collateral,
                available,
            });
        }

        let mint_config = self.config.mint.clone();
        let market = self.market_mut(market_id)?;
        let outcome = market.ledger.mint(caller, collateral, &mint_config)?;

        self.debit_balance(caller, collateral)?;

        self.emit(EventPayload::MintCompleted(MintCompletedEvent {
            market_id,
            account_id: caller,
            collateral_amount: collateral,
            fee: outcome.fee,
            tokens_minted: outcome.tokens_minted,
        }));

        Ok(MintResult {
            fee: outcome.fee,
            tokens_minted: outcome.tokens_minted,
        })
    }

    // paired redemption in an active epoch, or one-sided redemption of the
    // winning token in the window between settlement and the next epoch start
    pub fn redeem(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        pfrt_amount: Amount,
        nfrt_amount: Amount,
    ) -> Result<RedeemResult, EngineError> {
        if self.emergency.is_halted(Component::Minting)
            || self.emergency.is_halted(Component::Settlement)
        {
            return Err(EngineError::SettlementPaused);
        }

        let one_sided = pfrt_amount.is_zero() != nfrt_amount.is_zero();

        let market = self.market_mut(market_id)?;
        let released = if one_sided {
            let epoch = market.epochs.current();
            if epoch.status != EpochStatus::Settled {
                return Err(EngineError::RedemptionWindowClosed);
            }
            let winning = epoch
                .settlement_rate
                .and_then(|rate| rate.winning_side())
                .ok_or(EngineError::RedemptionWindowClosed)?;

            let (side, amount) = if pfrt_amount.is_zero() {
                (TokenSide::Nfrt, nfrt_amount)
            } else {
                (TokenSide::Pfrt, pfrt_amount)
            };
            if side != winning {
                return Err(EngineError::NotWinningSide(side));
            }

            market.ledger.redeem_winning(caller, side, amount)?
        } else {
            market.ledger.redeem(caller, pfrt_amount, nfrt_amount)?
        };

        self.credit_balance(caller, released);

        self.emit(EventPayload::RedeemCompleted(RedeemCompletedEvent {
            market_id,
            account_id: caller,
            pfrt_amount,
            nfrt_amount,
            collateral_released: released,
        }));

        Ok(RedeemResult {
            collateral_released: released,
        })
    }

    // top up position collateral without minting
    pub fn add_margin(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        if self.emergency.is_halted(Component::Minting) {
            return Err(EngineError::MintingPaused);
        }

        let available = self.balance(caller);
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let market = self.market_mut(market_id)?;
        market.ledger.add_margin(caller, amount)?;
        self.debit_balance(caller, amount)?;

        self.emit(EventPayload::MarginAdded(MarginAddedEvent {
            market_id,
            account_id: caller,
            amount,
        }));
        Ok(())
    }

    // move tokens between positions. collateral stays with the sender.
    pub fn transfer_tokens(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        to: AccountId,
        side: TokenSide,
        amount: Amount,
    ) -> Result<(), EngineError> {
        if self.emergency.is_global_pause() {
            return Err(EngineError::MintingPaused);
        }

        let mint_config = self.config.mint.clone();
        let market = self.market_mut(market_id)?;
        market.ledger.transfer(caller, to, side, amount, &mint_config)?;

        self.emit(EventPayload::TokensTransferred(TokensTransferredEvent {
            market_id,
            from: caller,
            to,
            side,
            amount,
        }));
        Ok(())
    }
}
