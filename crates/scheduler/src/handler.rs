//! Callbacks the loops drive.

use async_trait::async_trait;
use meter_core::RequestMeta;
use thiserror::Error;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Why an assignment did not go through.
#[derive(Debug, Error)]
pub enum AssignError {
    /// Try again next tick. The request stays queued.
    #[error("assignment failed, will retry: {0}")]
    Retry(String),

    /// The request can never be served and is withdrawn from the queue.
    #[error("assignment rejected permanently: {0}")]
    Terminal(String),
}

/// Grants the head request to a recorder.
///
/// `Ok(true)` removes the request from the queue. `Ok(false)` and
/// [`AssignError::Retry`] leave it at the head.
#[async_trait]
pub trait AssignmentHandler: Send + Sync {
    async fn assign(&self, meta: &RequestMeta) -> Result<bool, AssignError>;
}

/// Tells a waiting requester where it stands.
#[async_trait]
pub trait StatusHandler: Send + Sync {
    async fn update(
        &self,
        meta: &RequestMeta,
        position: usize,
        wait_seconds: u64,
    ) -> Result<bool, HandlerError>;
}
