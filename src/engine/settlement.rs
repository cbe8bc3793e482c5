// 10.0 settlement.rs: oracle management, funding-rate updates, epoch settlement,
// and claims. settlement prefers the TWAP over the latest aggregate, and a
// pinned emergency rate overrides both.

use rust_decimal::Decimal;

use crate::config::OracleConfig;
use crate::emergency::Component;
use crate::epoch::{compute_funding_distribution, EpochError, EpochStatus};
use crate::events::{
    EmergencyRateClearedEvent, EmergencyRateSetEvent, EpochSettledEvent, EventPayload,
    FundingClaimedEvent, FundingRateUpdatedEvent, NewEpochStartedEvent, OracleAddedEvent,
    OracleStatusChangedEvent,
};
use crate::ledger::LedgerError;
use crate::roles::Role;
use crate::types::{AccountId, Amount, EpochId, MarketId, OracleId, Rate};

use super::core::Engine;
use super::results::{
    ClaimResult, EngineError, EpochRollover, FundingUpdateResult, SettlementResult,
};

impl Engine {
    // 10.1: oracle administration
    pub fn add_oracle(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        oracle_id: OracleId,
        weight_bps: i32,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;

        let market = self.market_mut(market_id)?;
        market.oracle.add_oracle(oracle_id, weight_bps)?;
        let active_oracles = market.oracle.active_count();

        self.emit(EventPayload::OracleAdded(OracleAddedEvent {
            market_id,
            oracle_id,
            weight_bps,
            active_oracles,
        }));
        Ok(())
    }

    pub fn set_oracle_status(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        oracle_id: OracleId,
        active: bool,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;

        let market = self.market_mut(market_id)?;
        market.oracle.set_oracle_status(oracle_id, active)?;
        let active_oracles = market.oracle.active_count();

        self.emit(EventPayload::OracleStatusChanged(OracleStatusChangedEvent {
            market_id,
            oracle_id,
            active,
            active_oracles,
        }));
        Ok(())
    }

    pub fn submit_report(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        oracle_id: OracleId,
        rate: Rate,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Operator)?;
        let now = self.now();
        let market = self.market_mut(market_id)?;
        market.oracle.submit_report(oracle_id, rate, now)?;
        Ok(())
    }

    // 10.2: crank the aggregator
    pub fn update_funding_rate(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
    ) -> Result<FundingUpdateResult, EngineError> {
        self.roles.require(caller, Role::Operator)?;

        let oracle_config = self.config.oracle.clone();
        let now = self.now();
        let market = self.market_mut(market_id)?;

        let sample = market.oracle.update_funding_rate(now, &oracle_config)?;
        let twap_rate = market.oracle.twap(now, &oracle_config).map(|t| t.rate);
        let contributing = sample.contributing.len();

        self.emit(EventPayload::FundingRateUpdated(FundingRateUpdatedEvent {
            market_id,
            rate: sample.rate,
            twap_rate,
            contributing_oracles: contributing,
        }));

        Ok(FundingUpdateResult {
            rate: sample.rate,
            twap_rate,
            contributing_oracles: contributing,
        })
    }

    pub fn emergency_set_rate(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        rate: Rate,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;

        let market = self.market_mut(market_id)?;
        market.oracle.emergency_update(rate);

        self.emit(EventPayload::EmergencyRateSet(EmergencyRateSetEvent {
            market_id,
            by: caller,
            rate,
        }));
        Ok(())
    }

    pub fn clear_emergency_rate(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;

        let market = self.market_mut(market_id)?;
        market.oracle.deactivate_emergency()?;

        self.emit(EventPayload::EmergencyRateCleared(EmergencyRateClearedEvent {
            market_id,
            by: caller,
        }));
        Ok(())
    }

    // oracle parameter updates revalidate the whole config, same as the AMM
    // setters; the quorum floor and TWAP window bounds live in validate().
    pub fn update_oracle_parameters(
        &mut self,
        caller: AccountId,
        oracle: OracleConfig,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        let mut candidate = self.config.clone();
        candidate.oracle = oracle;
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }

    // 10.3: settle the current epoch using the oracle signal. a pinned emergency
    // rate wins, then the TWAP, then the latest aggregate.
    pub fn settle_epoch(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
    ) -> Result<SettlementResult, EngineError> {
        self.roles.require(caller, Role::Operator)?;
        if self.emergency.is_halted(Component::Settlement) {
            return Err(EngineError::SettlementPaused);
        }

        let oracle_config = self.config.oracle.clone();
        let now = self.now();
        let market = self.market(market_id)?;

        let rate = if market.oracle.is_emergency() {
            market.oracle.current_rate()
        } else {
            market
                .oracle
                .twap(now, &oracle_config)
                .map(|t| t.rate)
                .or_else(|| market.oracle.current_rate())
        }
        .ok_or(EngineError::NoSettlementRate(market.epochs.current().id))?;

        self.settle_with_rate(market_id, rate)
    }

    // privileged escape hatch for operational recovery: the rate is supplied
    // directly instead of read from the aggregator
    pub fn manual_settlement(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        rate: Rate,
    ) -> Result<SettlementResult, EngineError> {
        self.roles.require(caller, Role::Admin)?;
        if self.emergency.is_halted(Component::Settlement) {
            return Err(EngineError::SettlementPaused);
        }

        self.settle_with_rate(market_id, rate)
    }

    fn settle_with_rate(
        &mut self,
        market_id: MarketId,
        rate: Rate,
    ) -> Result<SettlementResult, EngineError> {
        let now = self.now();
        let market = self.market_mut(market_id)?;

        // precondition check before any ledger mutation, so a rejected settle
        // leaves no partial funding records behind
        market.epochs.refresh_status(now);
        let epoch_id = market.epochs.current().id;
        match market.epochs.current().status {
            EpochStatus::Active => {
                return Err(EpochError::EpochStillActive {
                    epoch_id,
                    end_time: market.epochs.current().end_time,
                }
                .into())
            }
            EpochStatus::Settled => return Err(EpochError::AlreadySettled(epoch_id).into()),
            EpochStatus::ReadyToSettle => {}
        }

        let balances: Vec<(AccountId, Amount, Amount)> = market
            .ledger
            .accounts()
            .into_iter()
            .filter_map(|account| {
                market.ledger.position(account).map(|p| {
                    (account, p.pfrt_balance, p.nfrt_balance)
                })
            })
            .filter(|(_, p, n)| !p.is_zero() || !n.is_zero())
            .collect();

        let distribution = compute_funding_distribution(rate, &balances);
        for delta in &distribution.deltas {
            market.ledger.record_funding(delta.account, epoch_id, delta.delta);
        }

        market
            .epochs
            .settle(rate, distribution.total_distributed, now)?;
        let positions_affected = distribution.deltas.len();
        let total = distribution.total_distributed;

        self.emit(EventPayload::EpochSettled(EpochSettledEvent {
            market_id,
            epoch_id,
            settlement_rate: rate,
            total_funding_distributed: total,
            positions_affected,
        }));

        Ok(SettlementResult {
            epoch_id,
            settlement_rate: rate,
            total_funding_distributed: total,
            positions_affected,
        })
    }

    pub fn start_new_epoch(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
    ) -> Result<EpochRollover, EngineError> {
        self.roles.require(caller, Role::Operator)?;
        if self.emergency.is_halted(Component::Settlement) {
            return Err(EngineError::SettlementPaused);
        }

        let now = self.now();
        let duration = self.config.epoch.epoch_duration_ms;
        let market = self.market_mut(market_id)?;

        let epoch = market.epochs.start_new_epoch(now, duration)?;
        let rollover = EpochRollover {
            epoch_id: epoch.id,
            start_time: epoch.start_time,
            end_time: epoch.end_time,
        };

        self.emit(EventPayload::NewEpochStarted(NewEpochStartedEvent {
            market_id,
            epoch_id: rollover.epoch_id,
            start_time: rollover.start_time,
            end_time: rollover.end_time,
        }));

        Ok(rollover)
    }

    // 10.4: claim the signed funding delta for a settled epoch. the pending
    // entry is consumed on success, so a second claim finds nothing.
    pub fn claim_funding(
        &mut self,
        caller: AccountId,
        market_id: MarketId,
        epoch_id: EpochId,
    ) -> Result<ClaimResult, EngineError> {
        if self.emergency.is_halted(Component::Settlement) {
            return Err(EngineError::SettlementPaused);
        }

        {
            let market = self.market(market_id)?;
            let settled = market
                .epochs
                .epoch(epoch_id)
                .map(|e| e.status == EpochStatus::Settled)
                .unwrap_or(false);
            if !settled {
                return Err(EpochError::NotSettled(epoch_id).into());
            }

            // a negative claim needs covering balance before anything mutates
            let pending = market
                .ledger
                .pending_funding(caller, epoch_id)
                .ok_or(LedgerError::NothingToClaim { epoch_id })?;
            if pending < Decimal::ZERO {
                let owed = Amount::new_unchecked(-pending);
                let available = self.balance(caller);
                if available < owed {
                    return Err(EngineError::InsufficientBalance {
                        required: owed,
                        available,
                    });
                }
            }
        }

        let market = self.market_mut(market_id)?;
        let delta = market.ledger.take_funding(caller, epoch_id)?;
        // the vault pays receivers and absorbs payers; zero-sum once all claim
        market.ledger.apply_vault_delta(-delta);

        let new_balance = if delta >= Decimal::ZERO {
            self.credit_balance(caller, Amount::new_unchecked(delta))
        } else {
            let owed = Amount::new_unchecked(-delta);
            self.debit_balance(caller, owed)?;
            self.balance(caller)
        };

        self.emit(EventPayload::FundingClaimed(FundingClaimedEvent {
            market_id,
            epoch_id,
            account_id: caller,
            amount: delta,
        }));

        Ok(ClaimResult {
            epoch_id,
            amount: delta,
            new_balance,
        })
    }
}
