// 5.0 epoch.rs: the settlement lifecycle. an epoch moves Active -> ReadyToSettle
// -> Settled exactly once, the settlement rate is written once and never again,
// and start_new_epoch rolls the sequence forward.
//
// 5.1 the funding distribution is constructed to be exactly zero-sum: the losing
// side pays |rate| times its balance, the winning side splits the paid total pro
// rata, and the rounding remainder lands on the largest receiver so the deltas
// sum to zero to the last digit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AccountId, Amount, EpochId, Rate, Timestamp, TokenSide};

// receiver shares are rounded to this many places before the remainder correction
const SHARE_PRECISION: u32 = 12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EpochError {
    #[error("Epoch {epoch_id:?} is still active until {end_time:?}")]
    EpochStillActive {
        epoch_id: EpochId,
        end_time: Timestamp,
    },

    #[error("Epoch {0:?} is already settled")]
    AlreadySettled(EpochId),

    #[error("Epoch {0:?} is not settled yet")]
    NotSettled(EpochId),

    #[error("Invalid transition from {from:?} on {event:?}")]
    InvalidTransition { from: EpochStatus, event: EpochEvent },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochStatus {
    Active,
    ReadyToSettle,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochEvent {
    EndTimeReached,
    Settle,
    StartNext,
}

// 5.2: the pure transition function. every lifecycle change goes through here,
// invalid moves come back as typed errors instead of silent flag flips.
pub fn transition(from: EpochStatus, event: EpochEvent) -> Result<EpochStatus, EpochError> {
    match (from, event) {
        (EpochStatus::Active, EpochEvent::EndTimeReached) => Ok(EpochStatus::ReadyToSettle),
        (EpochStatus::ReadyToSettle, EpochEvent::Settle) => Ok(EpochStatus::Settled),
        (EpochStatus::Settled, EpochEvent::StartNext) => Ok(EpochStatus::Active),
        _ => Err(EpochError::InvalidTransition { from, event }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    pub id: EpochId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: EpochStatus,
    // written once in settle(), immutable after
    pub settlement_rate: Option<Rate>,
    pub total_funding_distributed: Amount,
}

impl Epoch {
    fn open(id: EpochId, start: Timestamp, duration_ms: i64) -> Self {
        Self {
            id,
            start_time: start,
            end_time: Timestamp::from_millis(start.as_millis() + duration_ms),
            status: EpochStatus::Active,
            settlement_rate: None,
            total_funding_distributed: Amount::zero(),
        }
    }
}

// one account's signed funding delta for a settled epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingDelta {
    pub account: AccountId,
    pub delta: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingDistribution {
    pub rate: Rate,
    pub deltas: Vec<FundingDelta>,
    pub total_distributed: Amount,
}

// 5.3: payer-exact, receiver-pro-rata construction. input is each account's
// balances on both sides; output deltas sum to exactly zero.
pub fn compute_funding_distribution(
    rate: Rate,
    balances: &[(AccountId, Amount, Amount)],
) -> FundingDistribution {
    let winning = match rate.winning_side() {
        Some(side) => side,
        None => {
            return FundingDistribution {
                rate,
                deltas: Vec::new(),
                total_distributed: Amount::zero(),
            }
        }
    };

    let side_balance = |pfrt: Amount, nfrt: Amount, side: TokenSide| match side {
        TokenSide::Pfrt => pfrt,
        TokenSide::Nfrt => nfrt,
    };

    let total_winning: Decimal = balances
        .iter()
        .map(|(_, p, n)| side_balance(*p, *n, winning).value())
        .sum();
    if total_winning.is_zero() {
        // nobody on the winning side, no counterparty to pay
        return FundingDistribution {
            rate,
            deltas: Vec::new(),
            total_distributed: Amount::zero(),
        };
    }

    // each losing-side holder pays exactly |rate| * balance
    let mut payments: Vec<(AccountId, Decimal)> = Vec::new();
    let mut total_paid = Decimal::ZERO;
    for (account, pfrt, nfrt) in balances {
        let losing = side_balance(*pfrt, *nfrt, winning.opposite());
        if losing.is_zero() {
            continue;
        }
        let pay = losing.value() * rate.abs();
        total_paid += pay;
        payments.push((*account, pay));
    }

    if total_paid.is_zero() {
        return FundingDistribution {
            rate,
            deltas: Vec::new(),
            total_distributed: Amount::zero(),
        };
    }

    // receivers split the paid total pro rata; the division remainder goes to
    // the largest receiver (lowest account id on ties)
    let mut receipts: Vec<(AccountId, Decimal)> = Vec::new();
    let mut distributed = Decimal::ZERO;
    let mut largest: Option<(usize, Decimal)> = None;
    for (account, pfrt, nfrt) in balances {
        let win = side_balance(*pfrt, *nfrt, winning);
        if win.is_zero() {
            continue;
        }
        let share = (total_paid * win.value() / total_winning).round_dp(SHARE_PRECISION);
        distributed += share;
        receipts.push((*account, share));
        let candidate = (receipts.len() - 1, win.value());
        match largest {
            Some((_, best)) if best >= win.value() => {}
            _ => largest = Some(candidate),
        }
    }
    if let Some((index, _)) = largest {
        receipts[index].1 += total_paid - distributed;
    }

    // merge pays and receipts into one signed delta per account
    let mut deltas: Vec<FundingDelta> = Vec::new();
    for (account, _, _) in balances {
        let paid = payments
            .iter()
            .find(|(a, _)| a == account)
            .map(|(_, p)| *p)
            .unwrap_or(Decimal::ZERO);
        let received = receipts
            .iter()
            .find(|(a, _)| a == account)
            .map(|(_, r)| *r)
            .unwrap_or(Decimal::ZERO);
        let delta = received - paid;
        if !delta.is_zero() {
            deltas.push(FundingDelta {
                account: *account,
                delta,
            });
        }
    }

    FundingDistribution {
        rate,
        deltas,
        total_distributed: Amount::new_unchecked(total_paid),
    }
}

// 5.4: the manager. owns the current epoch and the settled history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochManager {
    current: Epoch,
    history: Vec<Epoch>,
}

impl EpochManager {
    pub fn new(start: Timestamp, duration_ms: i64) -> Self {
        Self {
            current: Epoch::open(EpochId(1), start, duration_ms),
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> &Epoch {
        &self.current
    }

    pub fn epoch(&self, id: EpochId) -> Option<&Epoch> {
        if self.current.id == id {
            Some(&self.current)
        } else {
            self.history.iter().find(|e| e.id == id)
        }
    }

    // Active -> ReadyToSettle happens by the clock, checked on entry to the
    // operations that require it rather than by a separate call
    pub fn refresh_status(&mut self, now: Timestamp) {
        if self.current.status == EpochStatus::Active && now >= self.current.end_time {
            if let Ok(next) = transition(self.current.status, EpochEvent::EndTimeReached) {
                self.current.status = next;
            }
        }
    }

    pub fn settle(
        &mut self,
        rate: Rate,
        total_distributed: Amount,
        now: Timestamp,
    ) -> Result<&Epoch, EpochError> {
        self.refresh_status(now);

        match self.current.status {
            EpochStatus::Active => {
                return Err(EpochError::EpochStillActive {
                    epoch_id: self.current.id,
                    end_time: self.current.end_time,
                })
            }
            EpochStatus::Settled => return Err(EpochError::AlreadySettled(self.current.id)),
            EpochStatus::ReadyToSettle => {}
        }

        self.current.status = transition(self.current.status, EpochEvent::Settle)?;
        self.current.settlement_rate = Some(rate);
        self.current.total_funding_distributed = total_distributed;

        Ok(&self.current)
    }

    pub fn start_new_epoch(
        &mut self,
        now: Timestamp,
        duration_ms: i64,
    ) -> Result<&Epoch, EpochError> {
        if self.current.status != EpochStatus::Settled {
            return Err(EpochError::NotSettled(self.current.id));
        }
        transition(self.current.status, EpochEvent::StartNext)?;

        let next_id = EpochId(self.current.id.0 + 1);
        let finished = std::mem::replace(&mut self.current, Epoch::open(next_id, now, duration_ms));
        self.history.push(finished);

        Ok(&self.current)
    }
}
