//! Store and lock error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    /// A multi-key transaction reported a failure in at least one operation.
    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("wrong type for key: {0}")]
    WrongType(String),
}

#[cfg(feature = "store-redis")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock {resource} not acquired after {attempts} attempts")]
    NotAcquired { resource: String, attempts: u32 },

    #[error("lock store error: {0}")]
    Store(#[from] StoreError),
}
