// 8.0 results.rs: the engine's error type and the result structs operations
// return. component errors fold in via #[from] so the operation files can use
// `?` against ledger, pool, oracle, epoch, and emergency calls directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amm::AmmError;
use crate::config::ConfigError;
use crate::emergency::EmergencyError;
use crate::epoch::EpochError;
use crate::ledger::LedgerError;
use crate::oracle::OracleError;
use crate::roles::RoleError;
use crate::types::{AccountId, Amount, EpochId, MarketId, Rate, Timestamp, TokenSide};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown market {0:?}")]
    UnknownMarket(MarketId),

    #[error("Market {0:?} already exists")]
    MarketExists(MarketId),

    #[error("Unknown account {0:?}")]
    UnknownAccount(AccountId),

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Minting is paused")]
    MintingPaused,

    #[error("Settlement is paused")]
    SettlementPaused,

    #[error("Trading is paused")]
    TradingIsPaused,

    #[error("One-sided redemption is only open while the current epoch is settled")]
    RedemptionWindowClosed,

    #[error("Token side {0} did not win this epoch")]
    NotWinningSide(TokenSide),

    #[error("No settlement rate available for epoch {0:?}")]
    NoSettlementRate(EpochId),

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Amm(#[from] AmmError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Epoch(#[from] EpochError),

    #[error(transparent)]
    Emergency(#[from] EmergencyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MintResult {
    pub fee: Amount,
    pub tokens_minted: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedeemResult {
    pub collateral_released: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapResult {
    pub amount_out: Amount,
    pub fee: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityResult {
    pub shares: Amount,
    pub pfrt_amount: Amount,
    pub nfrt_amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingUpdateResult {
    pub rate: Rate,
    pub twap_rate: Option<Rate>,
    pub contributing_oracles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub epoch_id: EpochId,
    pub settlement_rate: Rate,
    pub total_funding_distributed: Amount,
    pub positions_affected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub epoch_id: EpochId,
    // signed: positive credited to the claimant, negative debited
    pub amount: Decimal,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRollover {
    pub epoch_id: EpochId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}
