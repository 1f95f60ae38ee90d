//! Endpoint modules, one per concern.

mod health;
mod jobs;
mod recorders;

use axum::http::StatusCode;
use meter_queue::QueueError;
use tracing::error;

pub use health::{health, metrics, queue_status};
pub use jobs::{cancel_recording, enqueue_recording};
pub use recorders::recorder_status;

/// Map a queue failure to a 500 with its message.
pub(crate) fn internal(context: &str, e: QueueError) -> (StatusCode, String) {
    error!(error = %e, "{context}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {e}"))
}
