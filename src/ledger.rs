// 2.0 ledger.rs: the minting module and position ledger for one market. collateral
// comes in, an equal pair of PFRT and NFRT goes out net of the mint fee, and every
// balance is tracked per account so settlement can compute funding obligations.
//
// 2.1 conservation is the load-bearing invariant: vault holdings always equal the
// sum of per-position collateral plus accumulated protocol fees, and total PFRT
// outstanding equals total NFRT outstanding until a post-settlement one-sided
// redemption converts the winning side's claim.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MintConfig;
use crate::types::{AccountId, Amount, EpochId, TokenSide};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Insufficient collateral: need {required}, have {available}")]
    InsufficientCollateral { required: Amount, available: Amount },

    #[error("Position would exceed maximum size {max}")]
    PositionTooLarge { max: Amount },

    #[error("Redemption amounts must be equal: {pfrt} PFRT vs {nfrt} NFRT")]
    UnequalAmounts { pfrt: Amount, nfrt: Amount },

    #[error("Insufficient {side} balance: need {required}, have {available}")]
    InsufficientTokens {
        side: TokenSide,
        required: Amount,
        available: Amount,
    },

    #[error("No unclaimed funding for epoch {epoch_id:?}")]
    NothingToClaim { epoch_id: EpochId },

    #[error("No position for account {0:?}")]
    UnknownPosition(AccountId),
}

// 2.2: one account's exposure in one market. never deleted, zero balances persist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    pub pfrt_balance: Amount,
    pub nfrt_balance: Amount,
    pub collateral: Amount,
    // signed funding owed to (positive) or by (negative) this position, keyed by
    // settled epoch. claiming removes the entry, which is what makes claims idempotent.
    pub pending_funding: HashMap<EpochId, Decimal>,
}

impl Position {
    pub fn balance(&self, side: TokenSide) -> Amount {
        match side {
            TokenSide::Pfrt => self.pfrt_balance,
            TokenSide::Nfrt => self.nfrt_balance,
        }
    }

    fn balance_mut(&mut self, side: TokenSide) -> &mut Amount {
        match side {
            TokenSide::Pfrt => &mut self.pfrt_balance,
            TokenSide::Nfrt => &mut self.nfrt_balance,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.pfrt_balance.is_zero() && self.nfrt_balance.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MintOutcome {
    pub fee: Amount,
    pub tokens_minted: Amount,
}

// 2.3: the ledger itself. owns all positions and the vault accounting for one market.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionLedger {
    positions: HashMap<AccountId, Position>,
    total_pfrt: Amount,
    total_nfrt: Amount,
    // gross collateral held, including fees not yet swept
    vault_collateral: Amount,
    protocol_fees: Amount,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // 2.4: mint. fee is carved out of the deposit, the net backs both tokens 1:1.
    pub fn mint(
        &mut self,
        account: AccountId,
        collateral: Amount,
        config: &MintConfig,
    ) -> Result<MintOutcome, LedgerError> {
        if collateral.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let fee = collateral.mul(config.mint_fee_bps.as_fraction());
        let net = collateral
            .checked_sub(fee)
            .ok_or(LedgerError::ZeroAmount)?;

        // validate against the current position before touching the map, so a
        // rejected mint cannot leave an empty position behind
        let current = self.positions.get(&account).cloned().unwrap_or_default();

        let pfrt_after = current.pfrt_balance.add(net);
        let nfrt_after = current.nfrt_balance.add(net);
        if pfrt_after > config.max_position_size || nfrt_after > config.max_position_size {
            return Err(LedgerError::PositionTooLarge {
                max: config.max_position_size,
            });
        }

        // collateralization check on open: deposited >= ratio * max side
        let collateral_after = current.collateral.add(net);
        let max_side = pfrt_after.max(nfrt_after);
        let required = max_side.mul(config.required_collateral_ratio);
        if collateral_after < required {
            return Err(LedgerError::InsufficientCollateral {
                required,
                available: collateral_after,
            });
        }

        let position = self.positions.entry(account).or_default();
        position.pfrt_balance = pfrt_after;
        position.nfrt_balance = nfrt_after;
        position.collateral = collateral_after;

        self.total_pfrt = self.total_pfrt.add(net);
        self.total_nfrt = self.total_nfrt.add(net);
        self.vault_collateral = self.vault_collateral.add(collateral);
        self.protocol_fees = self.protocol_fees.add(fee);

        Ok(MintOutcome {
            fee,
            tokens_minted: net,
        })
    }

    // 2.5: paired redemption. burns equal amounts of both tokens, releases collateral 1:1.
    pub fn redeem(
        &mut self,
        account: AccountId,
        pfrt_amount: Amount,
        nfrt_amount: Amount,
    ) -> Result<Amount, LedgerError> {
        if pfrt_amount != nfrt_amount {
            return Err(LedgerError::UnequalAmounts {
                pfrt: pfrt_amount,
                nfrt: nfrt_amount,
            });
        }
        if pfrt_amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let position = self
            .positions
            .get_mut(&account)
            .ok_or(LedgerError::UnknownPosition(account))?;

        let pfrt_after = position.pfrt_balance.checked_sub(pfrt_amount).ok_or(
            LedgerError::InsufficientTokens {
                side: TokenSide::Pfrt,
                required: pfrt_amount,
                available: position.pfrt_balance,
            },
        )?;
        let nfrt_after = position.nfrt_balance.checked_sub(nfrt_amount).ok_or(
            LedgerError::InsufficientTokens {
                side: TokenSide::Nfrt,
                required: nfrt_amount,
                available: position.nfrt_balance,
            },
        )?;
        let collateral_after = position.collateral.checked_sub(pfrt_amount).ok_or(
            LedgerError::InsufficientCollateral {
                required: pfrt_amount,
                available: position.collateral,
            },
        )?;

        position.pfrt_balance = pfrt_after;
        position.nfrt_balance = nfrt_after;
        position.collateral = collateral_after;

        self.total_pfrt = self.total_pfrt.checked_sub(pfrt_amount).unwrap_or_default();
        self.total_nfrt = self.total_nfrt.checked_sub(nfrt_amount).unwrap_or_default();
        self.vault_collateral = self
            .vault_collateral
            .checked_sub(pfrt_amount)
            .unwrap_or_default();

        Ok(pfrt_amount)
    }

    // 2.6: one-sided redemption of the winning token. only legal between settlement
    // and the next epoch start, and the engine enforces that window.
    pub fn redeem_winning(
        &mut self,
        account: AccountId,
        side: TokenSide,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let position = self
            .positions
            .get_mut(&account)
            .ok_or(LedgerError::UnknownPosition(account))?;

        let balance = position.balance(side);
        let balance_after =
            balance
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientTokens {
                    side,
                    required: amount,
                    available: balance,
                })?;
        let collateral_after = position.collateral.checked_sub(amount).ok_or(
            LedgerError::InsufficientCollateral {
                required: amount,
                available: position.collateral,
            },
        )?;

        *position.balance_mut(side) = balance_after;
        position.collateral = collateral_after;

        match side {
            TokenSide::Pfrt => {
                self.total_pfrt = self.total_pfrt.checked_sub(amount).unwrap_or_default()
            }
            TokenSide::Nfrt => {
                self.total_nfrt = self.total_nfrt.checked_sub(amount).unwrap_or_default()
            }
        }
        self.vault_collateral = self
            .vault_collateral
            .checked_sub(amount)
            .unwrap_or_default();

        Ok(amount)
    }

    // 2.7: top up a position's collateral without minting. this is what makes
    // above-1.0 collateral ratios reachable.
    pub fn add_margin(&mut self, account: AccountId, amount: Amount) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let position = self.positions.entry(account).or_default();
        position.collateral = position.collateral.add(amount);
        self.vault_collateral = self.vault_collateral.add(amount);

        Ok(())
    }

    // 2.8: token transfer between positions. balances move, collateral stays put,
    // so a pure transferee can trade on the AMM but cannot redeem against the vault.
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        side: TokenSide,
        amount: Amount,
        config: &MintConfig,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let sender = self
            .positions
            .get(&from)
            .ok_or(LedgerError::UnknownPosition(from))?;
        let sender_after =
            sender
                .balance(side)
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientTokens {
                    side,
                    required: amount,
                    available: sender.balance(side),
                })?;

        let recipient_after = self
            .positions
            .get(&to)
            .map(|p| p.balance(side))
            .unwrap_or_default()
            .add(amount);
        if recipient_after > config.max_position_size {
            return Err(LedgerError::PositionTooLarge {
                max: config.max_position_size,
            });
        }

        // both sides validated, now mutate
        if let Some(sender) = self.positions.get_mut(&from) {
            *sender.balance_mut(side) = sender_after;
        }
        let recipient = self.positions.entry(to).or_default();
        *recipient.balance_mut(side) = recipient_after;

        Ok(())
    }

    // 2.9: engine-mediated balance moves for AMM deposits and withdrawals.
    // tokens leaving a position into pool reserves do not change total supply.
    pub fn debit_tokens(
        &mut self,
        account: AccountId,
        side: TokenSide,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let position = self
            .positions
            .get_mut(&account)
            .ok_or(LedgerError::UnknownPosition(account))?;

        let balance = position.balance(side);
        let after = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientTokens {
                side,
                required: amount,
                available: balance,
            })?;
        *position.balance_mut(side) = after;

        Ok(())
    }

    pub fn credit_tokens(&mut self, account: AccountId, side: TokenSide, amount: Amount) {
        let position = self.positions.entry(account).or_default();
        *position.balance_mut(side) = position.balance(side).add(amount);
    }

    // 2.10: settlement posts signed funding deltas here; claims drain them.
    pub fn record_funding(&mut self, account: AccountId, epoch_id: EpochId, delta: Decimal) {
        let position = self.positions.entry(account).or_default();
        let entry = position
            .pending_funding
            .entry(epoch_id)
            .or_insert(Decimal::ZERO);
        *entry += delta;
    }

    // removes the pending entry. a second take for the same epoch finds nothing,
    // which is the idempotency guarantee for claims.
    pub fn take_funding(
        &mut self,
        account: AccountId,
        epoch_id: EpochId,
    ) -> Result<Decimal, LedgerError> {
        let position = self
            .positions
            .get_mut(&account)
            .ok_or(LedgerError::UnknownPosition(account))?;

        position
            .pending_funding
            .remove(&epoch_id)
            .ok_or(LedgerError::NothingToClaim { epoch_id })
    }

    pub fn pending_funding(&self, account: AccountId, epoch_id: EpochId) -> Option<Decimal> {
        self.positions
            .get(&account)?
            .pending_funding
            .get(&epoch_id)
            .copied()
    }

    pub fn position(&self, account: AccountId) -> Option<&Position> {
        self.positions.get(&account)
    }

    // deterministic iteration order for settlement
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.positions.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    pub fn total_pfrt(&self) -> Amount {
        self.total_pfrt
    }

    pub fn total_nfrt(&self) -> Amount {
        self.total_nfrt
    }

    pub fn vault_collateral(&self) -> Amount {
        self.vault_collateral
    }

    pub fn protocol_fees(&self) -> Amount {
        self.protocol_fees
    }

    // vault pays out (positive claim) or absorbs (negative claim) funding
    pub fn apply_vault_delta(&mut self, delta: Decimal) {
        let value = self.vault_collateral.value() + delta;
        self.vault_collateral = Amount::new(value).unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amt(v: Decimal) -> Amount {
        Amount::new_unchecked(v)
    }

    #[test]
    fn mint_takes_fee_and_issues_pair() {
        let mut ledger = PositionLedger::new();
        let config = MintConfig::default(); // 10 bps

        let outcome = ledger.mint(AccountId(1), amt(dec!(1000)), &config).unwrap();

        assert_eq!(outcome.fee.value(), dec!(1.000));
        assert_eq!(outcome.tokens_minted.value(), dec!(999.000));

        let pos = ledger.position(AccountId(1)).unwrap();
        assert_eq!(pos.pfrt_balance.value(), dec!(999.000));
        assert_eq!(pos.nfrt_balance.value(), dec!(999.000));
        assert_eq!(pos.collateral.value(), dec!(999.000));

        assert_eq!(ledger.vault_collateral().value(), dec!(1000));
        assert_eq!(ledger.protocol_fees().value(), dec!(1.000));
    }

    #[test]
    fn mint_rejects_zero() {
        let mut ledger = PositionLedger::new();
        let config = MintConfig::default();

        assert!(matches!(
            ledger.mint(AccountId(1), Amount::zero(), &config),
            Err(LedgerError::ZeroAmount)
        ));
    }

    #[test]
    fn mint_enforces_position_cap() {
        let mut ledger = PositionLedger::new();
        let mut config = MintConfig::default();
        config.max_position_size = amt(dec!(500));

        let result = ledger.mint(AccountId(1), amt(dec!(1000)), &config);
        assert!(matches!(result, Err(LedgerError::PositionTooLarge { .. })));
    }

    #[test]
    fn mint_enforces_collateral_ratio() {
        let mut ledger = PositionLedger::new();
        let mut config = MintConfig::default();
        config.required_collateral_ratio = dec!(1.2);

        // plain mint backs exactly 1.0x, fails at 1.2x
        let result = ledger.mint(AccountId(1), amt(dec!(1000)), &config);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientCollateral { .. })
        ));

        // margin first, then the same mint passes
        ledger.add_margin(AccountId(1), amt(dec!(200))).unwrap();
        assert!(ledger.mint(AccountId(1), amt(dec!(1000)), &config).is_ok());
    }

    #[test]
    fn redeem_requires_equal_amounts() {
        let mut ledger = PositionLedger::new();
        let config = MintConfig::default();
        ledger.mint(AccountId(1), amt(dec!(1000)), &config).unwrap();

        let result = ledger.redeem(AccountId(1), amt(dec!(100)), amt(dec!(50)));
        assert!(matches!(result, Err(LedgerError::UnequalAmounts { .. })));
    }

    #[test]
    fn redeem_releases_collateral_one_to_one() {
        let mut ledger = PositionLedger::new();
        let config = MintConfig::default();
        ledger.mint(AccountId(1), amt(dec!(1000)), &config).unwrap();

        let released = ledger
            .redeem(AccountId(1), amt(dec!(500)), amt(dec!(500)))
            .unwrap();
        assert_eq!(released.value(), dec!(500));

        let pos = ledger.position(AccountId(1)).unwrap();
        assert_eq!(pos.pfrt_balance.value(), dec!(499.000));
        assert_eq!(pos.collateral.value(), dec!(499.000));
        assert_eq!(ledger.vault_collateral().value(), dec!(500));
    }

    #[test]
    fn conservation_across_mint_redeem() {
        let mut ledger = PositionLedger::new();
        let config = MintConfig::default();

        ledger.mint(AccountId(1), amt(dec!(1000)), &config).unwrap();
        ledger.mint(AccountId(2), amt(dec!(2500)), &config).unwrap();
        ledger
            .redeem(AccountId(1), amt(dec!(300)), amt(dec!(300)))
            .unwrap();

        assert_eq!(ledger.total_pfrt(), ledger.total_nfrt());

        // vault = sum of position collateral + fees
        let position_collateral: Amount = [AccountId(1), AccountId(2)]
            .iter()
            .filter_map(|id| ledger.position(*id))
            .map(|p| p.collateral)
            .sum();
        assert_eq!(
            ledger.vault_collateral().value(),
            position_collateral.add(ledger.protocol_fees()).value()
        );
    }

    #[test]
    fn transfer_moves_tokens_not_collateral() {
        let mut ledger = PositionLedger::new();
        let config = MintConfig::default();
        ledger.mint(AccountId(1), amt(dec!(1000)), &config).unwrap();

        ledger
            .transfer(
                AccountId(1),
                AccountId(2),
                TokenSide::Pfrt,
                amt(dec!(100)),
                &config,
            )
            .unwrap();

        assert_eq!(
            ledger
                .position(AccountId(2))
                .unwrap()
                .pfrt_balance
                .value(),
            dec!(100)
        );
        assert!(ledger.position(AccountId(2)).unwrap().collateral.is_zero());
        assert_eq!(
            ledger
                .position(AccountId(1))
                .unwrap()
                .pfrt_balance
                .value(),
            dec!(899.000)
        );
    }

    #[test]
    fn funding_claim_is_idempotent() {
        let mut ledger = PositionLedger::new();
        let epoch = EpochId(1);

        ledger.record_funding(AccountId(1), epoch, dec!(25));

        assert_eq!(ledger.take_funding(AccountId(1), epoch).unwrap(), dec!(25));
        assert!(matches!(
            ledger.take_funding(AccountId(1), epoch),
            Err(LedgerError::NothingToClaim { .. })
        ));
    }

    #[test]
    fn one_sided_winning_redemption() {
        let mut ledger = PositionLedger::new();
        let config = MintConfig::default();
        ledger.mint(AccountId(1), amt(dec!(1000)), &config).unwrap();

        let released = ledger
            .redeem_winning(AccountId(1), TokenSide::Pfrt, amt(dec!(100)))
            .unwrap();
        assert_eq!(released.value(), dec!(100));

        let pos = ledger.position(AccountId(1)).unwrap();
        assert_eq!(pos.pfrt_balance.value(), dec!(899.000));
        assert_eq!(pos.nfrt_balance.value(), dec!(999.000));
    }
}
