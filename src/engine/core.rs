// 9.0 core.rs: the engine owns everything. markets, account balances, roles,
// the emergency controller, the event log, and the injected clock. every
// external operation goes through a method on Engine, executes to completion,
// and either commits fully or returns a typed error with nothing changed.

use std::collections::HashMap;

use crate::account::Account;
use crate::amm::AmmPool;
use crate::config::ProtocolConfig;
use crate::emergency::EmergencyController;
use crate::epoch::EpochManager;
use crate::events::{
    DepositEvent, EmergencyDeactivatedEvent, Event, EventCollector, EventEmitter, EventPayload,
    NewEpochStartedEvent, WithdrawalEvent,
};
use crate::ledger::{Position, PositionLedger};
use crate::oracle::OracleAggregator;
use crate::roles::{Role, RoleRegistry};
use crate::types::{AccountId, Amount, BlockNumber, MarketId, Timestamp};

use super::config::EngineConfig;
use super::results::EngineError;

// one market's components, owned together
#[derive(Debug)]
pub(crate) struct Market {
    pub(crate) ledger: PositionLedger,
    pub(crate) pool: AmmPool,
    pub(crate) oracle: OracleAggregator,
    pub(crate) epochs: EpochManager,
}

#[derive(Debug)]
pub struct Engine {
    pub(crate) config: ProtocolConfig,
    pub(crate) engine_config: EngineConfig,
    pub(crate) roles: RoleRegistry,
    pub(crate) emergency: EmergencyController,
    pub(crate) markets: HashMap<MarketId, Market>,
    pub(crate) accounts: HashMap<AccountId, Account>,
    pub(crate) events: EventCollector,
    now: Timestamp,
    block: BlockNumber,
}

impl Engine {
    // 9.1: construction validates the config up front, so a bad preset never
    // produces a half-working engine. the admin account is the bootstrap root.
    pub fn new(
        config: ProtocolConfig,
        engine_config: EngineConfig,
        admin: AccountId,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut roles = RoleRegistry::new();
        roles.grant(admin, Role::Admin);

        Ok(Self {
            config,
            engine_config,
            roles,
            emergency: EmergencyController::new(),
            markets: HashMap::new(),
            accounts: HashMap::new(),
            events: EventCollector::new(),
            now: Timestamp::from_millis(0),
            block: BlockNumber(0),
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    // 9.2: injected clock and block counter. tests and the simulator drive these;
    // nothing inside the engine reads wall time.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn current_block(&self) -> BlockNumber {
        self.block
    }

    pub fn set_time(&mut self, now: Timestamp) {
        self.now = now;
        self.run_expiry_check();
    }

    pub fn advance_time(&mut self, ms: i64) {
        self.now = Timestamp::from_millis(self.now.as_millis() + ms);
        self.run_expiry_check();
    }

    pub fn set_block(&mut self, block: BlockNumber) {
        self.block = block;
    }

    pub fn advance_block(&mut self) {
        self.block = BlockNumber(self.block.0 + 1);
    }

    // emergency auto-expiry rides on the clock
    fn run_expiry_check(&mut self) {
        if let Some(record) = self.emergency.check_expiry(self.now, &self.config.emergency) {
            let duration = self.now.as_millis() - record.activated_at.as_millis();
            self.emit(EventPayload::EmergencyDeactivated(
                EmergencyDeactivatedEvent {
                    by: None,
                    reason: record.reason,
                    duration_ms: duration,
                },
            ));
        }
    }

    // 9.3: collateral accounts. deposits create accounts implicitly.
    pub fn deposit(&mut self, account: AccountId, amount: Amount) -> Result<(), EngineError> {
        if amount.is_zero() {
            return Err(EngineError::InsufficientBalance {
                required: amount,
                available: Amount::zero(),
            });
        }

        let now = self.now;
        let new_balance = self
            .accounts
            .entry(account)
            .or_insert_with(|| Account::new(now))
            .deposit(amount);

        self.emit(EventPayload::Deposit(DepositEvent {
            account_id: account,
            amount,
            new_balance,
        }));
        Ok(())
    }

    pub fn withdraw(&mut self, account: AccountId, amount: Amount) -> Result<(), EngineError> {
        let entry = self
            .accounts
            .get_mut(&account)
            .ok_or(EngineError::UnknownAccount(account))?;
        let available = entry.balance;
        let after = entry
            .withdraw(amount)
            .ok_or(EngineError::InsufficientBalance {
                required: amount,
                available,
            })?;

        self.emit(EventPayload::Withdrawal(WithdrawalEvent {
            account_id: account,
            amount,
            new_balance: after,
        }));
        Ok(())
    }

    pub fn balance(&self, account: AccountId) -> Amount {
        self.accounts
            .get(&account)
            .map(|entry| entry.balance)
            .unwrap_or_default()
    }

    pub fn account(&self, account: AccountId) -> Option<&Account> {
        self.accounts.get(&account)
    }

    // internal balance moves against a market vault. these do not count toward
    // the lifetime deposit/withdrawal totals.
    pub(crate) fn debit_balance(
        &mut self,
        account: AccountId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        let entry = self
            .accounts
            .get_mut(&account)
            .ok_or(EngineError::UnknownAccount(account))?;
        let after = entry
            .balance
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientBalance {
                required: amount,
                available: entry.balance,
            })?;
        entry.balance = after;
        Ok(())
    }

    pub(crate) fn credit_balance(&mut self, account: AccountId, amount: Amount) -> Amount {
        let now = self.now;
        let entry = self
            .accounts
            .entry(account)
            .or_insert_with(|| Account::new(now));
        entry.balance = entry.balance.add(amount);
        entry.balance
    }

    // 9.4: role administration. only an Admin can hand out capabilities.
    pub fn grant_role(
        &mut self,
        caller: AccountId,
        target: AccountId,
        role: Role,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        self.roles.grant(target, role);
        Ok(())
    }

    pub fn revoke_role(
        &mut self,
        caller: AccountId,
        target: AccountId,
        role: Role,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        self.roles.revoke(target, role);
        Ok(())
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    // 9.5: market administration. creating a market opens its first epoch.
    pub fn add_market(&mut self, caller: AccountId, market_id: MarketId) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        if self.markets.contains_key(&market_id) {
            return Err(EngineError::MarketExists(market_id));
        }

        let epochs = EpochManager::new(self.now, self.config.epoch.epoch_duration_ms);
        let first = epochs.current();
        let (epoch_id, start_time, end_time) = (first.id, first.start_time, first.end_time);

        self.markets.insert(
            market_id,
            Market {
                ledger: PositionLedger::new(),
                pool: AmmPool::new(),
                oracle: OracleAggregator::new(),
                epochs,
            },
        );

        self.emit(EventPayload::NewEpochStarted(NewEpochStartedEvent {
            market_id,
            epoch_id,
            start_time,
            end_time,
        }));
        Ok(())
    }

    pub(crate) fn market(&self, market_id: MarketId) -> Result<&Market, EngineError> {
        self.markets
            .get(&market_id)
            .ok_or(EngineError::UnknownMarket(market_id))
    }

    pub(crate) fn market_mut(&mut self, market_id: MarketId) -> Result<&mut Market, EngineError> {
        self.markets
            .get_mut(&market_id)
            .ok_or(EngineError::UnknownMarket(market_id))
    }

    // 9.6: read-only component access for queries and tests
    pub fn ledger(&self, market_id: MarketId) -> Result<&PositionLedger, EngineError> {
        Ok(&self.market(market_id)?.ledger)
    }

    pub fn pool(&self, market_id: MarketId) -> Result<&AmmPool, EngineError> {
        Ok(&self.market(market_id)?.pool)
    }

    pub fn oracle(&self, market_id: MarketId) -> Result<&OracleAggregator, EngineError> {
        Ok(&self.market(market_id)?.oracle)
    }

    pub fn epochs(&self, market_id: MarketId) -> Result<&EpochManager, EngineError> {
        Ok(&self.market(market_id)?.epochs)
    }

    pub fn position(
        &self,
        market_id: MarketId,
        account: AccountId,
    ) -> Result<Option<&Position>, EngineError> {
        Ok(self.market(market_id)?.ledger.position(account))
    }

    pub fn emergency(&self) -> &EmergencyController {
        &self.emergency
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub(crate) fn emit(&mut self, payload: EventPayload) {
        let event = Event::new(self.events.next_id(), self.now, payload);
        if self.engine_config.verbose {
            println!("[event] {:?}", event.payload);
        }
        self.events.emit(event);
        // ring behavior: drop oldest past the cap
        while self.events.events().len() > self.engine_config.max_events {
            self.events.drop_oldest();
        }
    }
}
