// 6.0 emergency.rs: the circuit breaker. guardians vote, a quorum of distinct
// votes inside the vote window trips the global pause, and an admin (or the max
// duration clock) clears it. component-level pause flags are independent of the
// global flag; callers must treat either one as a halt.
//
// 6.1 deactivation clears only the global flag. components paused individually
// stay paused until explicitly resumed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmergencyConfig;
use crate::types::{AccountId, Timestamp};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmergencyError {
    #[error("Guardian {0:?} already voted in this window")]
    AlreadyVoted(AccountId),

    #[error("An emergency is already active")]
    EmergencyAlreadyActive,

    #[error("No active emergency")]
    NoActiveEmergency,

    #[error("Cooldown active until {until:?}")]
    CooldownActive { until: Timestamp },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Minting,
    Amm,
    Settlement,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Minting, Component::Amm, Component::Settlement];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmergencySeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyVote {
    pub guardian: AccountId,
    pub reason: String,
    pub severity: EmergencySeverity,
    pub cast_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveEmergency {
    pub reason: String,
    pub severity: EmergencySeverity,
    pub activated_at: Timestamp,
    pub guardian_votes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmergencyController {
    global_pause: bool,
    paused_components: HashSet<Component>,
    pending_votes: Vec<EmergencyVote>,
    active: Option<ActiveEmergency>,
    last_deactivated: Option<Timestamp>,
}

impl EmergencyController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_global_pause(&self) -> bool {
        self.global_pause
    }

    // the check every component makes before a state-changing operation
    pub fn is_halted(&self, component: Component) -> bool {
        self.global_pause || self.paused_components.contains(&component)
    }

    pub fn is_component_paused(&self, component: Component) -> bool {
        self.paused_components.contains(&component)
    }

    pub fn active(&self) -> Option<&ActiveEmergency> {
        self.active.as_ref()
    }

    pub fn pending_vote_count(&self) -> usize {
        self.pending_votes.len()
    }

    // 6.2: cast a vote. returns the activation record when this vote completes
    // the quorum. votes outside the window are pruned first, so a slow quorum
    // never accumulates across windows.
    pub fn vote(
        &mut self,
        guardian: AccountId,
        reason: String,
        severity: EmergencySeverity,
        now: Timestamp,
        config: &EmergencyConfig,
    ) -> Result<Option<ActiveEmergency>, EmergencyError> {
        if self.active.is_some() {
            return Err(EmergencyError::EmergencyAlreadyActive);
        }
        if let Some(deactivated) = self.last_deactivated {
            let until = Timestamp::from_millis(deactivated.as_millis() + config.cooldown_ms);
            if now < until {
                return Err(EmergencyError::CooldownActive { until });
            }
        }

        self.pending_votes
            .retain(|v| now.as_millis() - v.cast_at.as_millis() <= config.vote_window_ms);

        if self.pending_votes.iter().any(|v| v.guardian == guardian) {
            return Err(EmergencyError::AlreadyVoted(guardian));
        }

        self.pending_votes.push(EmergencyVote {
            guardian,
            reason: reason.clone(),
            severity,
            cast_at: now,
        });

        if self.pending_votes.len() < config.required_votes {
            return Ok(None);
        }

        // quorum reached. worst severity across the window wins.
        let severity = self
            .pending_votes
            .iter()
            .map(|v| v.severity)
            .max()
            .unwrap_or(severity);

        let record = ActiveEmergency {
            reason,
            severity,
            activated_at: now,
            guardian_votes: self.pending_votes.len(),
        };

        self.global_pause = true;
        if severity == EmergencySeverity::Critical {
            self.paused_components.extend(Component::ALL);
        }
        self.pending_votes.clear();
        self.active = Some(record.clone());

        Ok(Some(record))
    }

    // 6.3: admin deactivation. returns the closed record so callers can report
    // how long the halt lasted. component flags are left untouched.
    pub fn deactivate(&mut self, now: Timestamp) -> Result<ActiveEmergency, EmergencyError> {
        let record = self.active.take().ok_or(EmergencyError::NoActiveEmergency)?;
        self.global_pause = false;
        self.last_deactivated = Some(now);
        Ok(record)
    }

    // emergencies expire on their own after max_duration. callers invoke this
    // on the engine's clock ticks.
    pub fn check_expiry(&mut self, now: Timestamp, config: &EmergencyConfig) -> Option<ActiveEmergency> {
        let expired = match &self.active {
            Some(active) => {
                now.as_millis() - active.activated_at.as_millis() >= config.max_duration_ms
            }
            None => false,
        };
        if expired {
            let record = self.active.take();
            self.global_pause = false;
            self.last_deactivated = Some(now);
            record
        } else {
            None
        }
    }

    pub fn pause_component(&mut self, component: Component) {
        self.paused_components.insert(component);
    }

    pub fn resume_component(&mut self, component: Component) {
        self.paused_components.remove(&component);
    }
}
