// guardian administration and the emergency lifecycle as engine operations

use crate::config::EmergencyConfig;
use crate::emergency::{ActiveEmergency, Component, EmergencySeverity};
use crate::events::{
    ComponentPausedEvent, ComponentResumedEvent, EmergencyActivatedEvent,
    EmergencyDeactivatedEvent, EmergencyVoteCastEvent, EventPayload, GuardianAddedEvent,
};
use crate::roles::Role;
use crate::types::AccountId;

use super::core::Engine;
use super::results::EngineError;

impl Engine {
    pub fn add_guardian(
        &mut self,
        caller: AccountId,
        guardian: AccountId,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        self.roles.grant(guardian, Role::Guardian);
        let total_guardians = self.roles.accounts_with(Role::Guardian).len();

        self.emit(EventPayload::GuardianAdded(GuardianAddedEvent {
            guardian,
            total_guardians,
        }));
        Ok(())
    }

    // one guardian vote. when this vote completes the quorum the emergency
    // activates in the same call and the activation record is returned.
    pub fn vote_emergency(
        &mut self,
        caller: AccountId,
        reason: String,
        severity: EmergencySeverity,
    ) -> Result<Option<ActiveEmergency>, EngineError> {
        self.roles.require(caller, Role::Guardian)?;

        let emergency_config = self.config.emergency.clone();
        let now = self.now();
        let activated = self
            .emergency
            .vote(caller, reason.clone(), severity, now, &emergency_config)?;
        let total_votes = match &activated {
            Some(record) => record.guardian_votes,
            None => self.emergency.pending_vote_count(),
        };

        self.emit(EventPayload::EmergencyVoteCast(EmergencyVoteCastEvent {
            guardian: caller,
            reason: reason.clone(),
            severity,
            total_votes,
        }));

        if let Some(record) = &activated {
            self.emit(EventPayload::EmergencyActivated(EmergencyActivatedEvent {
                reason: record.reason.clone(),
                severity: record.severity,
                guardian_votes: record.guardian_votes,
            }));
        }

        Ok(activated)
    }

    // clears the global pause only; individually paused components stay down
    pub fn deactivate_emergency(
        &mut self,
        caller: AccountId,
        reason: String,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;

        let now = self.now();
        let record = self.emergency.deactivate(now)?;
        let duration = now.as_millis() - record.activated_at.as_millis();

        self.emit(EventPayload::EmergencyDeactivated(
            EmergencyDeactivatedEvent {
                by: Some(caller),
                reason,
                duration_ms: duration,
            },
        ));
        Ok(())
    }

    pub fn pause_component(
        &mut self,
        caller: AccountId,
        component: Component,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        self.emergency.pause_component(component);

        self.emit(EventPayload::ComponentPaused(ComponentPausedEvent {
            component,
            by: caller,
        }));
        Ok(())
    }

    pub fn resume_component(
        &mut self,
        caller: AccountId,
        component: Component,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        self.emergency.resume_component(component);

        self.emit(EventPayload::ComponentResumed(ComponentResumedEvent {
            component,
            by: caller,
        }));
        Ok(())
    }

    // same validate-and-commit path as the AMM and oracle setters; the quorum
    // and timing bounds live in ProtocolConfig::validate.
    pub fn update_emergency_parameters(
        &mut self,
        caller: AccountId,
        emergency: EmergencyConfig,
    ) -> Result<(), EngineError> {
        self.roles.require(caller, Role::Admin)?;
        let mut candidate = self.config.clone();
        candidate.emergency = emergency;
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }
}
