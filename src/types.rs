// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, amounts, rates, timestamps, block numbers. each is a newtype so the compiler
// catches unit mixups.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OracleId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpochId(pub u64);

// ordering unit for the flash-loan guard. one state-changing swap per account per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u64);

// Pfrt pays out when the settled funding rate is positive, Nfrt when negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSide {
    Pfrt,
    Nfrt,
}

impl TokenSide {
    pub fn sign(&self) -> Decimal {
        match self {
            TokenSide::Pfrt => dec!(1),
            TokenSide::Nfrt => dec!(-1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            TokenSide::Pfrt => TokenSide::Nfrt,
            TokenSide::Nfrt => TokenSide::Pfrt,
        }
    }
}

impl fmt::Display for TokenSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSide::Pfrt => write!(f, "PFRT"),
            TokenSide::Nfrt => write!(f, "NFRT"),
        }
    }
}

// 1.1: non-negative token or collateral quantity. balances, reserves, fees all use this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: Amount) -> Self {
        Self(self.0 + other.0)
    }

    // None when the subtrahend exceeds the balance. callers turn this into a typed error.
    pub fn checked_sub(&self, other: Amount) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - other.0))
        }
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn min(&self, other: Amount) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn max(&self, other: Amount) -> Self {
        Self(self.0.max(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, a| acc.add(a))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, a| acc.add(*a))
    }
}

// 1.2: signed funding rate as a fraction. 0.025 = +2.5% per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rate(Decimal);

impl Rate {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Decimal {
        self.0.abs()
    }

    // which token side is net-credited at this rate. None when flat.
    pub fn winning_side(&self) -> Option<TokenSide> {
        if self.is_positive() {
            Some(TokenSide::Pfrt)
        } else if self.is_negative() {
            Some(TokenSide::Nfrt)
        } else {
            None
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: basis points. 100 bps = 1%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bps(i32);

impl Bps {
    pub fn new(bps: i32) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 4)
    }
}

// 1.4: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn elapsed_millis(&self, other: &Timestamp) -> i64 {
        (other.0 - self.0).abs()
    }

    // UTC day ordinal. the AMM's daily volume counter resets when this ticks over.
    pub fn utc_day(&self) -> i64 {
        self.0.div_euclid(86_400_000)
    }
}
