// 12.0 account.rs: free collateral accounts. balances here are outside every
// market; minting moves value from here into a market vault and redemption
// moves it back. accounts are created implicitly by the first deposit.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub balance: Amount,
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(created_at: Timestamp) -> Self {
        Self {
            balance: Amount::zero(),
            total_deposited: Amount::zero(),
            total_withdrawn: Amount::zero(),
            created_at,
        }
    }

    pub fn deposit(&mut self, amount: Amount) -> Amount {
        self.balance = self.balance.add(amount);
        self.total_deposited = self.total_deposited.add(amount);
        self.balance
    }

    // returns the new balance, or None without mutating when funds are short
    pub fn withdraw(&mut self, amount: Amount) -> Option<Amount> {
        let after = self.balance.checked_sub(amount)?;
        self.balance = after;
        self.total_withdrawn = self.total_withdrawn.add(amount);
        Some(after)
    }
}
