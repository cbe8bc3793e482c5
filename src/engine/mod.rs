// the engine: one struct owning every market plus the cross-cutting state,
// operations split across files by concern. core.rs has construction, clock,
// accounts, and emergency control; minting.rs, trading.rs, and settlement.rs
// hold the market operations.

mod config;
mod core;
mod emergency;
mod minting;
mod results;
mod settlement;
mod trading;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{
    ClaimResult, EngineError, EpochRollover, FundingUpdateResult, LiquidityResult, MintResult,
    RedeemResult, SettlementResult, SwapResult,
};
