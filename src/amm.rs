// 3.0 amm.rs: constant-product market for the PFRT/NFRT pair. the pool never
// learns about epochs or settlement, it only trades the two reserves and keeps
// its anti-manipulation guards: per-block flash-loan lockout, per-trade size cap,
// daily volume cap, and a slippage bound on top of the caller's own min-out.
//
// 3.1 swap fee stays in the input reserve, so k grows with every trade and the
// growth accrues to liquidity providers pro rata.

use std::collections::HashMap;

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AmmConfig;
use crate::types::{AccountId, Amount, BlockNumber, Timestamp, TokenSide};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmmError {
    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Trading is paused")]
    TradingIsPaused,

    #[error("Pool has no liquidity")]
    EmptyPool,

    #[error("Trade of {amount} exceeds max trade size {max}")]
    TradeTooLarge { amount: Amount, max: Amount },

    #[error("Daily volume limit {limit} exceeded")]
    DailyVolumeLimitExceeded { limit: Amount },

    #[error("Second swap by the same account in block {0:?}")]
    FlashLoanDetected(BlockNumber),

    #[error("Output {amount_out} below minimum {min_out}")]
    SlippageTooHigh { amount_out: Amount, min_out: Amount },

    #[error("Requested withdrawal exceeds provider share or reserves")]
    InsufficientLiquidity,

    #[error("Liquidity minted {minted} below minimum {min_out}")]
    MinLiquidityNotMet { minted: Amount, min_out: Amount },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub amount_out: Amount,
    pub fee: Amount,
}

// 3.2: pool state. reserves, provider shares, and the guard bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmmPool {
    pfrt_reserve: Amount,
    nfrt_reserve: Amount,
    total_shares: Amount,
    provider_shares: HashMap<AccountId, Amount>,
    // cumulative input volume for the current UTC day
    daily_volume: Amount,
    volume_day: i64,
    // one state-changing swap per account per block
    last_trade_block: HashMap<AccountId, BlockNumber>,
    trading_paused: bool,
}

impl AmmPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&self, side: TokenSide) -> Amount {
        match side {
            TokenSide::Pfrt => self.pfrt_reserve,
            TokenSide::Nfrt => self.nfrt_reserve,
        }
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    pub fn provider_share(&self, account: AccountId) -> Amount {
        self.provider_shares
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub fn daily_volume(&self) -> Amount {
        self.daily_volume
    }

    pub fn is_paused(&self) -> bool {
        self.trading_paused
    }

    pub fn pause(&mut self) {
        self.trading_paused = true;
    }

    pub fn resume(&mut self) {
        self.trading_paused = false;
    }

    // constant-product invariant, exposed for monitoring and tests
    pub fn k(&self) -> Decimal {
        self.pfrt_reserve.value() * self.nfrt_reserve.value()
    }

    // NFRT per PFRT at current reserves. None while the pool is empty.
    pub fn spot_price(&self) -> Option<Decimal> {
        if self.pfrt_reserve.is_zero() {
            None
        } else {
            Some(self.nfrt_reserve.value() / self.pfrt_reserve.value())
        }
    }

    // 3.3: add liquidity. the first deposit sets the price and mints sqrt(p*n)
    // shares; later deposits mint the minimum proportional share so unbalanced
    // deposits donate the excess to the pool.
    pub fn add_liquidity(
        &mut self,
        account: AccountId,
        pfrt_amount: Amount,
        nfrt_amount: Amount,
        min_liquidity_out: Amount,
    ) -> Result<Amount, AmmError> {
        if pfrt_amount.is_zero() || nfrt_amount.is_zero() {
            return Err(AmmError::ZeroAmount);
        }

        let minted = if self.total_shares.is_zero() {
            let product = pfrt_amount.value() * nfrt_amount.value();
            let root = product.sqrt().ok_or(AmmError::ZeroAmount)?;
            Amount::new(root).ok_or(AmmError::ZeroAmount)?
        } else {
            let pfrt_share =
                pfrt_amount.value() * self.total_shares.value() / self.pfrt_reserve.value();
            let nfrt_share =
                nfrt_amount.value() * self.total_shares.value() / self.nfrt_reserve.value();
            Amount::new(pfrt_share.min(nfrt_share)).ok_or(AmmError::ZeroAmount)?
        };

        if minted < min_liquidity_out {
            return Err(AmmError::MinLiquidityNotMet {
                minted,
                min_out: min_liquidity_out,
            });
        }

        self.pfrt_reserve = self.pfrt_reserve.add(pfrt_amount);
        self.nfrt_reserve = self.nfrt_reserve.add(nfrt_amount);
        self.total_shares = self.total_shares.add(minted);
        let share = self.provider_shares.entry(account).or_default();
        *share = share.add(minted);

        Ok(minted)
    }

    // 3.4: remove liquidity by requested amounts. the share burn is the larger of
    // the two reserve fractions, so an unbalanced withdrawal costs proportionally more.
    pub fn remove_liquidity(
        &mut self,
        account: AccountId,
        pfrt_amount: Amount,
        nfrt_amount: Amount,
    ) -> Result<Amount, AmmError> {
        if pfrt_amount.is_zero() && nfrt_amount.is_zero() {
            return Err(AmmError::ZeroAmount);
        }
        if self.total_shares.is_zero() {
            return Err(AmmError::EmptyPool);
        }
        if pfrt_amount > self.pfrt_reserve || nfrt_amount > self.nfrt_reserve {
            return Err(AmmError::InsufficientLiquidity);
        }

        let pfrt_fraction = if self.pfrt_reserve.is_zero() {
            Decimal::ZERO
        } else {
            pfrt_amount.value() / self.pfrt_reserve.value()
        };
        let nfrt_fraction = if self.nfrt_reserve.is_zero() {
            Decimal::ZERO
        } else {
            nfrt_amount.value() / self.nfrt_reserve.value()
        };
        let burn = Amount::new(pfrt_fraction.max(nfrt_fraction) * self.total_shares.value())
            .ok_or(AmmError::InsufficientLiquidity)?;

        let held = self.provider_share(account);
        let held_after = held
            .checked_sub(burn)
            .ok_or(AmmError::InsufficientLiquidity)?;

        self.pfrt_reserve = self
            .pfrt_reserve
            .checked_sub(pfrt_amount)
            .ok_or(AmmError::InsufficientLiquidity)?;
        self.nfrt_reserve = self
            .nfrt_reserve
            .checked_sub(nfrt_amount)
            .ok_or(AmmError::InsufficientLiquidity)?;
        self.total_shares = self
            .total_shares
            .checked_sub(burn)
            .ok_or(AmmError::InsufficientLiquidity)?;
        self.provider_shares.insert(account, held_after);

        Ok(burn)
    }

    // 3.5: swap. validation order matters for error reporting and is covered by tests:
    // pause, zero, trade size, flash-loan guard, daily volume, then pricing.
    pub fn swap(
        &mut self,
        account: AccountId,
        token_in: TokenSide,
        amount_in: Amount,
        min_amount_out: Amount,
        block: BlockNumber,
        now: Timestamp,
        config: &AmmConfig,
    ) -> Result<SwapOutcome, AmmError> {
        if self.trading_paused {
            return Err(AmmError::TradingIsPaused);
        }
        if amount_in.is_zero() {
            return Err(AmmError::ZeroAmount);
        }
        if self.pfrt_reserve.is_zero() || self.nfrt_reserve.is_zero() {
            return Err(AmmError::EmptyPool);
        }
        if amount_in > config.max_trade_size {
            return Err(AmmError::TradeTooLarge {
                amount: amount_in,
                max: config.max_trade_size,
            });
        }

        if self.last_trade_block.get(&account) == Some(&block) {
            return Err(AmmError::FlashLoanDetected(block));
        }

        // the UTC day rolls only when a swap commits, so a rejected swap
        // cannot reset the published daily total
        let day = now.utc_day();
        let volume_after = if day == self.volume_day {
            self.daily_volume.add(amount_in)
        } else {
            amount_in
        };
        if volume_after > config.daily_volume_limit {
            return Err(AmmError::DailyVolumeLimitExceeded {
                limit: config.daily_volume_limit,
            });
        }

        let reserve_in = self.reserve(token_in);
        let reserve_out = self.reserve(token_in.opposite());

        let fee = amount_in.mul(config.fee_bps.as_fraction());
        let net_in = amount_in.value() - fee.value();
        let out_value = reserve_out.value() * net_in / (reserve_in.value() + net_in);
        let amount_out = Amount::new(out_value).ok_or(AmmError::ZeroAmount)?;

        if amount_out < min_amount_out {
            return Err(AmmError::SlippageTooHigh {
                amount_out,
                min_out: min_amount_out,
            });
        }

        // protocol-level impact bound: realized output may not fall more than
        // max_slippage_bps below the pre-trade spot value of the input
        let spot_value = amount_in.value() * reserve_out.value() / reserve_in.value();
        let floor = spot_value * (Decimal::ONE - config.max_slippage_bps.as_fraction());
        if amount_out.value() < floor {
            return Err(AmmError::SlippageTooHigh {
                amount_out,
                min_out: Amount::new_unchecked(floor),
            });
        }

        // fee remains in the input reserve
        match token_in {
            TokenSide::Pfrt => {
                self.pfrt_reserve = self.pfrt_reserve.add(amount_in);
                self.nfrt_reserve = self
                    .nfrt_reserve
                    .checked_sub(amount_out)
                    .ok_or(AmmError::InsufficientLiquidity)?;
            }
            TokenSide::Nfrt => {
                self.nfrt_reserve = self.nfrt_reserve.add(amount_in);
                self.pfrt_reserve = self
                    .pfrt_reserve
                    .checked_sub(amount_out)
                    .ok_or(AmmError::InsufficientLiquidity)?;
            }
        }

        self.volume_day = day;
        self.daily_volume = volume_after;
        self.last_trade_block.insert(account, block);

        Ok(SwapOutcome { amount_out, fee })
    }
}
