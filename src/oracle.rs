// 4.0 oracle.rs: the funding-rate aggregator. weighted sources submit signed
// rates, aggregation takes the weight-normalized average of fresh reports from
// active sources, and a rolling sample window backs the TWAP used by settlement.
//
// 4.1 emergency override is a strategy switch, never a subclass: while
// emergency_mode is set the pinned rate is the current rate, normal aggregation
// is rejected, and deactivation resumes the ordinary path.

use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OracleConfig;
use crate::types::{OracleId, Rate, Timestamp};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("Oracle {0:?} already registered")]
    DuplicateOracle(OracleId),

    #[error("Unknown oracle {0:?}")]
    UnknownOracle(OracleId),

    #[error("Oracle {0:?} is inactive")]
    OracleInactive(OracleId),

    #[error("Oracle weight must be positive")]
    InvalidWeight,

    #[error("Insufficient oracles: need {required}, have {available} fresh")]
    InsufficientOracles { required: usize, available: usize },

    #[error("Emergency mode is active; normal aggregation suspended")]
    EmergencyModeActive,

    #[error("Emergency mode is not active")]
    NotInEmergencyMode,

    #[error("Aggregate {rate} deviates more than allowed from TWAP {twap}")]
    ExcessiveDeviation { rate: Rate, twap: Rate },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSource {
    pub id: OracleId,
    pub weight_bps: i32,
    pub active: bool,
    pub last_rate: Option<Rate>,
    pub last_report: Option<Timestamp>,
}

// one aggregation result. contributing holds the raw per-source rates that went in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRateSample {
    pub timestamp: Timestamp,
    pub rate: Rate,
    pub contributing: Vec<(OracleId, Rate)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwapData {
    pub rate: Rate,
    pub window_ms: i64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleAggregator {
    sources: HashMap<OracleId, OracleSource>,
    // rolling window, oldest first. pruned against the TWAP window on every update.
    samples: VecDeque<FundingRateSample>,
    current_rate: Option<Rate>,
    emergency_mode: bool,
    emergency_rate: Option<Rate>,
}

impl OracleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_oracle(&mut self, id: OracleId, weight_bps: i32) -> Result<(), OracleError> {
        if weight_bps <= 0 {
            return Err(OracleError::InvalidWeight);
        }
        if self.sources.contains_key(&id) {
            return Err(OracleError::DuplicateOracle(id));
        }

        self.sources.insert(
            id,
            OracleSource {
                id,
                weight_bps,
                active: true,
                last_rate: None,
                last_report: None,
            },
        );
        Ok(())
    }

    pub fn set_oracle_status(&mut self, id: OracleId, active: bool) -> Result<(), OracleError> {
        let source = self
            .sources
            .get_mut(&id)
            .ok_or(OracleError::UnknownOracle(id))?;
        source.active = active;
        Ok(())
    }

    pub fn submit_report(
        &mut self,
        id: OracleId,
        rate: Rate,
        now: Timestamp,
    ) -> Result<(), OracleError> {
        let source = self
            .sources
            .get_mut(&id)
            .ok_or(OracleError::UnknownOracle(id))?;
        if !source.active {
            return Err(OracleError::OracleInactive(id));
        }

        source.last_rate = Some(rate);
        source.last_report = Some(now);
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.sources.values().filter(|s| s.active).count()
    }

    pub fn source(&self, id: OracleId) -> Option<&OracleSource> {
        self.sources.get(&id)
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency_mode
    }

    pub fn samples(&self) -> impl Iterator<Item = &FundingRateSample> {
        self.samples.iter()
    }

    // 4.2: aggregation. active sources with a report inside the freshness window
    // contribute rate * weight; the sum is normalized by the contributing weight,
    // so deactivating a source never skews the average.
    pub fn update_funding_rate(
        &mut self,
        now: Timestamp,
        config: &OracleConfig,
    ) -> Result<FundingRateSample, OracleError> {
        if self.emergency_mode {
            return Err(OracleError::EmergencyModeActive);
        }

        let mut contributing: Vec<(OracleId, Rate, i64)> = Vec::new();
        for source in self.sources.values() {
            if !source.active {
                continue;
            }
            let (rate, reported) = match (source.last_rate, source.last_report) {
                (Some(r), Some(t)) => (r, t),
                _ => continue,
            };
            if now.as_millis() - reported.as_millis() > config.freshness_window_ms {
                continue;
            }
            contributing.push((source.id, rate, source.weight_bps as i64));
        }

        if contributing.len() < config.min_oracles {
            return Err(OracleError::InsufficientOracles {
                required: config.min_oracles,
                available: contributing.len(),
            });
        }

        contributing.sort_by_key(|(id, _, _)| id.0);

        let total_weight: Decimal = contributing
            .iter()
            .map(|(_, _, w)| Decimal::from(*w))
            .sum();
        let weighted_sum: Decimal = contributing
            .iter()
            .map(|(_, rate, w)| rate.value() * Decimal::from(*w))
            .sum();
        let aggregate = Rate::new(weighted_sum / total_weight);

        // deviation guard against TWAP, disabled at 0 bps
        if config.max_deviation_bps.value() > 0 {
            if let Some(twap) = self.twap(now, config) {
                let limit = config.max_deviation_bps.as_fraction();
                if (aggregate.value() - twap.rate.value()).abs() > limit {
                    return Err(OracleError::ExcessiveDeviation {
                        rate: aggregate,
                        twap: twap.rate,
                    });
                }
            }
        }

        let sample = FundingRateSample {
            timestamp: now,
            rate: aggregate,
            contributing: contributing
                .into_iter()
                .map(|(id, rate, _)| (id, rate))
                .collect(),
        };

        self.samples.push_back(sample.clone());
        self.prune_samples(now, config);
        self.current_rate = Some(aggregate);

        Ok(sample)
    }

    // 4.3: pinned-rate override. bypasses the quorum check entirely.
    pub fn emergency_update(&mut self, rate: Rate) {
        self.emergency_mode = true;
        self.emergency_rate = Some(rate);
    }

    pub fn deactivate_emergency(&mut self) -> Result<(), OracleError> {
        if !self.emergency_mode {
            return Err(OracleError::NotInEmergencyMode);
        }
        self.emergency_mode = false;
        self.emergency_rate = None;
        Ok(())
    }

    pub fn current_rate(&self) -> Option<Rate> {
        if self.emergency_mode {
            self.emergency_rate
        } else {
            self.current_rate
        }
    }

    // 4.4: time-weighted average over the sample window. each sample is weighted
    // by the time until the next sample, the last one by the time until now.
    pub fn twap(&self, now: Timestamp, config: &OracleConfig) -> Option<TwapData> {
        let cutoff = now.as_millis() - config.twap_window_ms;
        let in_window: Vec<&FundingRateSample> = self
            .samples
            .iter()
            .filter(|s| s.timestamp.as_millis() >= cutoff)
            .collect();

        if in_window.is_empty() {
            return None;
        }

        let mut weighted_sum = Decimal::ZERO;
        let mut total_time = Decimal::ZERO;
        for (i, sample) in in_window.iter().enumerate() {
            let until = match in_window.get(i + 1) {
                Some(next) => next.timestamp.as_millis(),
                None => now.as_millis(),
            };
            let span = Decimal::from((until - sample.timestamp.as_millis()).max(0));
            weighted_sum += sample.rate.value() * span;
            total_time += span;
        }

        let rate = if total_time.is_zero() {
            // all samples at the same instant, fall back to the newest
            in_window[in_window.len() - 1].rate
        } else {
            Rate::new(weighted_sum / total_time)
        };

        Some(TwapData {
            rate,
            window_ms: config.twap_window_ms,
            sample_count: in_window.len(),
        })
    }

    fn prune_samples(&mut self, now: Timestamp, config: &OracleConfig) {
        let cutoff = now.as_millis() - config.twap_window_ms;
        while let Some(front) = self.samples.front() {
            if front.timestamp.as_millis() < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
