// frate-core: conditional funding-rate token protocol core.
//
// users deposit collateral and mint an equal pair of PFRT and NFRT tokens whose
// relative value settles against an aggregated funding-rate signal at the end
// of each epoch. the crate is a deterministic, single-threaded engine: an
// injected clock and block counter, serialized operations, typed errors, and
// an event log for every state change.
//
// file map:
//   types.rs      primitives: ids, amounts, rates, basis points, timestamps
//   config.rs     protocol configuration, presets, validation
//   roles.rs      role-based access control
//   events.rs     event payloads and the collector
//   account.rs    free collateral accounts outside any market
//   ledger.rs     minting module and position ledger (conservation lives here)
//   amm.rs        constant-product pool with anti-manipulation guards
//   oracle.rs     weighted funding-rate aggregator, TWAP, emergency override
//   epoch.rs      epoch state machine and zero-sum funding distribution
//   emergency.rs  guardian quorum circuit breaker and component pauses
//   engine/       the Engine: orchestration of everything above

pub mod account;
pub mod amm;
pub mod config;
pub mod emergency;
pub mod engine;
pub mod epoch;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod roles;
pub mod types;

pub use account::Account;
pub use amm::{AmmError, AmmPool};
pub use config::{
    AmmConfig, ConfigError, EmergencyConfig, Environment, EpochConfig, MintConfig, OracleConfig,
    ProtocolConfig,
};
pub use emergency::{Component, EmergencyController, EmergencyError, EmergencySeverity};
pub use engine::{
    ClaimResult, Engine, EngineConfig, EngineError, EpochRollover, FundingUpdateResult,
    LiquidityResult, MintResult, RedeemResult, SettlementResult, SwapResult,
};
pub use epoch::{EpochError, EpochManager, EpochStatus};
pub use events::{Event, EventPayload};
pub use ledger::{LedgerError, Position, PositionLedger};
pub use oracle::{OracleAggregator, OracleError, TwapData};
pub use roles::{Role, RoleError, RoleRegistry};
pub use types::{
    AccountId, Amount, BlockNumber, Bps, EpochId, MarketId, OracleId, Rate, Timestamp, TokenSide,
};
