//! Payloads posted to the signaling API.

use meter_core::RecorderRequest;
use serde::{Deserialize, Serialize};

/// Event type carried by every notice the service sends.
pub const QUEUE_UPDATE_EVENT: &str = "QueueUpdate";

fn as_queue_update(request: &RecorderRequest) -> RecorderRequest {
    RecorderRequest {
        event_type: QUEUE_UPDATE_EVENT.to_string(),
        ..request.clone()
    }
}

/// Sent once a recorder has been claimed for the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantNotice {
    #[serde(flatten)]
    pub request: RecorderRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl GrantNotice {
    pub fn new(request: &RecorderRequest, token: Option<String>) -> Self {
        Self {
            request: as_queue_update(request),
            token,
        }
    }
}

/// Periodic position report for a waiting request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotice {
    #[serde(flatten)]
    pub request: RecorderRequest,
    pub position: usize,
    /// Seconds spent waiting.
    pub time: u64,
}

impl UpdateNotice {
    pub fn new(request: &RecorderRequest, position: usize, time: u64) -> Self {
        Self {
            request: as_queue_update(request),
            position,
            time,
        }
    }
}
