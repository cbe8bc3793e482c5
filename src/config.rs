// 7.0 config.rs: all settings in one place. fees, ratios, limits, quorums.
// 7.1 values seen varying between test and production deployments live here as
// configuration, never as hard-coded constants in the components.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Amount, Bps};

// Minting and redemption parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintConfig {
    // Fee charged on minting, in basis points. 10 = 0.1%
    pub mint_fee_bps: Bps,
    // Minimum collateral_deposited / max(pfrt, nfrt) ratio for a position.
    // 1.0 means a plain mint is exactly backed; conservative deployments use 1.2.
    pub required_collateral_ratio: Decimal,
    // Absolute cap on a single position's token balance (either side).
    pub max_position_size: Amount,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            mint_fee_bps: Bps::new(10), // 0.1%
            required_collateral_ratio: Decimal::ONE,
            max_position_size: Amount::new_unchecked(dec!(10_000_000)),
        }
    }
}

// 7.2: AMM settings. trade fee in bps plus the anti-manipulation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmConfig {
    // Trading fee in basis points. 30 = 0.3%
    pub fee_bps: Bps,
    // Maximum single trade input
    pub max_trade_size: Amount,
    // Maximum cumulative input volume per UTC day
    pub daily_volume_limit: Amount,
    // Upper bound on acceptable slippage tolerance
    pub max_slippage_bps: Bps,
}

impl Default for AmmConfig {
    fn default() -> Self {
        Self {
            fee_bps: Bps::new(30),
            max_trade_size: Amount::new_unchecked(dec!(100_000)),
            daily_volume_limit: Amount::new_unchecked(dec!(5_000_000)),
            max_slippage_bps: Bps::new(500), // 5%
        }
    }
}

// Oracle aggregation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    // Minimum active sources with fresh reports before aggregation proceeds
    pub min_oracles: usize,
    // Reports older than this are ignored during aggregation
    pub freshness_window_ms: i64,
    // Rolling window for the time-weighted average rate
    pub twap_window_ms: i64,
    // Maximum deviation of a new aggregate from the TWAP, in bps. 0 disables the guard.
    pub max_deviation_bps: Bps,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            min_oracles: 3,
            freshness_window_ms: 5 * 60 * 1000,
            twap_window_ms: 4 * 3600 * 1000, // 4 hours
            max_deviation_bps: Bps::new(0),
        }
    }
}

// Epoch lifecycle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochConfig {
    // Fixed epoch duration
    pub epoch_duration_ms: i64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            epoch_duration_ms: 8 * 3600 * 1000, // 8 hours
        }
    }
}

// Guardian quorum and emergency timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyConfig {
    // Distinct guardian votes required to activate an emergency
    pub required_votes: usize,
    // Votes must land within this window of each other to count toward quorum
    pub vote_window_ms: i64,
    // Minimum time between the end of one emergency and the start of the next
    pub cooldown_ms: i64,
    // Emergencies auto-expire after this long
    pub max_duration_ms: i64,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            required_votes: 3,
            vote_window_ms: 3600 * 1000,
            cooldown_ms: 3600 * 1000,        // 1 hour
            max_duration_ms: 86_400 * 1000,  // 1 day
        }
    }
}

// The complete protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub mint: MintConfig,
    pub amm: AmmConfig,
    pub oracle: OracleConfig,
    pub epoch: EpochConfig,
    pub emergency: EmergencyConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            mint: MintConfig::default(),
            amm: AmmConfig::default(),
            oracle: OracleConfig::default(),
            epoch: EpochConfig::default(),
            emergency: EmergencyConfig::default(),
        }
    }
}

impl ProtocolConfig {
    // Preset for test deployments: short epochs, small quorums, loose limits
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.epoch.epoch_duration_ms = 3600 * 1000; // 1 hour epochs
        config.oracle.min_oracles = 1;
        config.emergency.required_votes = 1;
        config.emergency.cooldown_ms = 0;
        config
    }

    // Preset for production with conservative settings
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.mint.required_collateral_ratio = dec!(1.2); // 120%
        config.amm.max_trade_size = Amount::new_unchecked(dec!(50_000));
        config.oracle.max_deviation_bps = Bps::new(1000); // 10%
        config.emergency.required_votes = 5;
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // fee checks. bounds match what the deployed parameter setters enforce.
        if self.mint.mint_fee_bps.value() < 0 || self.mint.mint_fee_bps.value() > 100 {
            return Err(ConfigError::InvalidMint {
                reason: "Mint fee must be between 0 and 100 bps".to_string(),
            });
        }

        if self.mint.required_collateral_ratio < Decimal::ONE {
            return Err(ConfigError::InvalidMint {
                reason: "Collateral ratio below 1.0 would under-back the pair".to_string(),
            });
        }

        if self.amm.fee_bps.value() < 0 || self.amm.fee_bps.value() > 100 {
            return Err(ConfigError::InvalidAmm {
                reason: "Trading fee must be between 0 and 100 bps".to_string(),
            });
        }

        if self.amm.max_slippage_bps.value() < 0 || self.amm.max_slippage_bps.value() > 1000 {
            return Err(ConfigError::InvalidAmm {
                reason: "Max slippage above 10% defeats the protection".to_string(),
            });
        }

        if self.amm.max_trade_size.is_zero() || self.amm.daily_volume_limit.is_zero() {
            return Err(ConfigError::InvalidAmm {
                reason: "Trade size and daily volume limits must be positive".to_string(),
            });
        }

        if self.oracle.min_oracles == 0 {
            return Err(ConfigError::InvalidOracle {
                reason: "Need at least 1 oracle source".to_string(),
            });
        }

        if self.oracle.twap_window_ms < 5 * 60 * 1000 {
            return Err(ConfigError::InvalidOracle {
                reason: "TWAP window below 5 minutes is manipulable".to_string(),
            });
        }

        if self.epoch.epoch_duration_ms <= 0 {
            return Err(ConfigError::InvalidEpoch {
                reason: "Epoch duration must be positive".to_string(),
            });
        }

        if self.emergency.required_votes == 0 {
            return Err(ConfigError::InvalidEmergency {
                reason: "Quorum of zero would let anyone pause the protocol".to_string(),
            });
        }

        if self.emergency.required_votes > 10 {
            return Err(ConfigError::InvalidEmergency {
                reason: "Quorum above 10 guardians makes activation unreachable".to_string(),
            });
        }

        if self.emergency.vote_window_ms <= 0 || self.emergency.max_duration_ms <= 0 {
            return Err(ConfigError::InvalidEmergency {
                reason: "Vote window and max duration must be positive".to_string(),
            });
        }

        if self.emergency.cooldown_ms < 0 {
            return Err(ConfigError::InvalidEmergency {
                reason: "Cooldown cannot be negative".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid mint config: {reason}")]
    InvalidMint { reason: String },
    #[error("Invalid AMM config: {reason}")]
    InvalidAmm { reason: String },
    #[error("Invalid oracle config: {reason}")]
    InvalidOracle { reason: String },
    #[error("Invalid epoch config: {reason}")]
    InvalidEpoch { reason: String },
    #[error("Invalid emergency config: {reason}")]
    InvalidEmergency { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ProtocolConfig {
        match self {
            Environment::Development => ProtocolConfig::default(),
            Environment::Testnet => ProtocolConfig::testnet(),
            Environment::Mainnet => ProtocolConfig::mainnet_conservative(),
        }
    }
}
