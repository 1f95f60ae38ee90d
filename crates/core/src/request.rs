use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request for a recorder, as submitted by the front end.
///
/// Everything except `request_id` is opaque to the queue; it is carried
/// through to the assignment and status callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderRequest {
    pub request_id: String,
    #[serde(default)]
    pub conference: String,
    #[serde(default)]
    pub room_param: String,
    #[serde(default)]
    pub external_api_url: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub participant: String,
}

/// The metadata record stored alongside each queued request id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    #[serde(flatten)]
    pub request: RecorderRequest,
    /// Set once at enqueue time.
    pub created: DateTime<Utc>,
}

impl RequestMeta {
    pub fn new(request: RecorderRequest, created: DateTime<Utc>) -> Self {
        Self { request, created }
    }

    pub fn request_id(&self) -> &str {
        &self.request.request_id
    }

    /// Whole seconds spent in the queue as of `now`.
    ///
    /// Clock skew between instances can put `created` slightly in the
    /// future; that reads as zero rather than a negative wait.
    pub fn wait_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.created).num_seconds().max(0) as u64
    }
}

/// One row of a queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuePosition {
    pub meta: RequestMeta,
    /// Zero-based index in the list at snapshot time.
    pub position: usize,
    pub wait_seconds: u64,
}
