//! Queue and tracker error types.
//!
//! Lock contention and orphaned heads are not errors here; the queue
//! reports them as [`DequeueOutcome`](crate::DequeueOutcome) variants.

use meter_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// No worker could be claimed. Expected under load.
    #[error("no recorders available")]
    ResourceUnavailable,

    /// A multi-key write failed. The list and metadata may disagree.
    #[error("store transaction failed: {0}")]
    StoreTransaction(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for QueueError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transaction(msg) => QueueError::StoreTransaction(msg),
            other => QueueError::Store(other),
        }
    }
}
