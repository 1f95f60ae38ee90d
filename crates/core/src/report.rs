//! Inbound recorder status events and their boundary validation.
//!
//! Recorders push their state as
//! `{ "jibriId": "...", "status": { "busyStatus": "IDLE", "health": { "healthStatus": "HEALTHY" } } }`.
//! Every field is optional at parse time so a malformed event can be
//! rejected with the name of the missing field instead of a serde error.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BusyStatus {
    Idle,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBlock {
    pub health_status: Option<HealthState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBlock {
    pub busy_status: Option<BusyStatus>,
    pub health: Option<HealthBlock>,
}

/// Raw status event as received from a recorder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStateReport {
    #[serde(alias = "workerId")]
    pub jibri_id: Option<String>,
    pub status: Option<StatusBlock>,
}

/// A validated report, ready for the pool tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: String,
    pub busy: bool,
    pub healthy: bool,
}

impl WorkerReport {
    /// Whether this report makes the worker claimable.
    pub fn is_available(&self) -> bool {
        !self.busy && self.healthy
    }
}

impl WorkerStateReport {
    pub fn validate(self) -> Result<WorkerReport, ValidationError> {
        let worker_id = self
            .jibri_id
            .ok_or(ValidationError::MissingField("jibriId"))?;
        if worker_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("jibriId"));
        }

        let status = self.status.ok_or(ValidationError::MissingField("status"))?;
        let busy = status
            .busy_status
            .ok_or(ValidationError::MissingField("status.busyStatus"))?;
        let health = status
            .health
            .and_then(|h| h.health_status)
            .ok_or(ValidationError::MissingField("status.health.healthStatus"))?;

        Ok(WorkerReport {
            worker_id,
            busy: busy == BusyStatus::Busy,
            healthy: health == HealthState::Healthy,
        })
    }
}
