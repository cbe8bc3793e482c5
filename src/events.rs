// 11.0: every state change produces an event. used for audit trails, state reconstruction,
// and notifying off-chain indexers. the EventPayload enum lists all event types.

use crate::emergency::{Component, EmergencySeverity};
use crate::types::{AccountId, Amount, BlockNumber, EpochId, MarketId, OracleId, Rate, Timestamp, TokenSide};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Minting events
    MintCompleted(MintCompletedEvent),
    RedeemCompleted(RedeemCompletedEvent),
    MarginAdded(MarginAddedEvent),
    TokensTransferred(TokensTransferredEvent),

    // AMM events
    SwapExecuted(SwapExecutedEvent),
    LiquidityAdded(LiquidityAddedEvent),
    LiquidityRemoved(LiquidityRemovedEvent),
    TradingPaused(TradingPausedEvent),
    TradingResumed(TradingResumedEvent),

    // Oracle events
    OracleAdded(OracleAddedEvent),
    OracleStatusChanged(OracleStatusChangedEvent),
    FundingRateUpdated(FundingRateUpdatedEvent),
    EmergencyRateSet(EmergencyRateSetEvent),
    EmergencyRateCleared(EmergencyRateClearedEvent),

    // Epoch events
    EpochSettled(EpochSettledEvent),
    NewEpochStarted(NewEpochStartedEvent),
    FundingClaimed(FundingClaimedEvent),

    // Emergency events
    GuardianAdded(GuardianAddedEvent),
    EmergencyVoteCast(EmergencyVoteCastEvent),
    EmergencyActivated(EmergencyActivatedEvent),
    EmergencyDeactivated(EmergencyDeactivatedEvent),
    ComponentPaused(ComponentPausedEvent),
    ComponentResumed(ComponentResumedEvent),

    // Account events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintCompletedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub collateral_amount: Amount,
    pub fee: Amount,
    pub tokens_minted: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemCompletedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub pfrt_amount: Amount,
    pub nfrt_amount: Amount,
    pub collateral_released: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginAddedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensTransferredEvent {
    pub market_id: MarketId,
    pub from: AccountId,
    pub to: AccountId,
    pub side: TokenSide,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapExecutedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub token_in: TokenSide,
    pub amount_in: Amount,
    pub amount_out: Amount,
    pub fee: Amount,
    pub block: BlockNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityAddedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub pfrt_amount: Amount,
    pub nfrt_amount: Amount,
    pub liquidity_minted: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityRemovedEvent {
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub pfrt_amount: Amount,
    pub nfrt_amount: Amount,
    pub liquidity_burned: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingPausedEvent {
    pub market_id: MarketId,
    pub by: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingResumedEvent {
    pub market_id: MarketId,
    pub by: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleAddedEvent {
    pub market_id: MarketId,
    pub oracle_id: OracleId,
    pub weight_bps: i32,
    pub active_oracles: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleStatusChangedEvent {
    pub market_id: MarketId,
    pub oracle_id: OracleId,
    pub active: bool,
    pub active_oracles: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRateUpdatedEvent {
    pub market_id: MarketId,
    pub rate: Rate,
    pub twap_rate: Option<Rate>,
    pub contributing_oracles: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRateSetEvent {
    pub market_id: MarketId,
    pub by: AccountId,
    pub rate: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRateClearedEvent {
    pub market_id: MarketId,
    pub by: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochSettledEvent {
    pub market_id: MarketId,
    pub epoch_id: EpochId,
    pub settlement_rate: Rate,
    pub total_funding_distributed: Amount,
    pub positions_affected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEpochStartedEvent {
    pub market_id: MarketId,
    pub epoch_id: EpochId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingClaimedEvent {
    pub market_id: MarketId,
    pub epoch_id: EpochId,
    pub account_id: AccountId,
    // signed: positive credits the claimant, negative debits them
    pub amount: rust_decimal::Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianAddedEvent {
    pub guardian: AccountId,
    pub total_guardians: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyVoteCastEvent {
    pub guardian: AccountId,
    pub reason: String,
    pub severity: EmergencySeverity,
    pub total_votes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyActivatedEvent {
    pub reason: String,
    pub severity: EmergencySeverity,
    pub guardian_votes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyDeactivatedEvent {
    // None when the emergency expired on its own
    pub by: Option<AccountId>,
    pub reason: String,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentPausedEvent {
    pub component: Component,
    pub by: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResumedEvent {
    pub component: Component,
    pub by: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account_id: AccountId,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account_id: AccountId,
    pub amount: Amount,
    pub new_balance: Amount,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn drop_oldest(&mut self) {
        if !self.events.is_empty() {
            self.events.remove(0);
        }
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
