//! The concrete assignment and status callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use meter_core::RequestMeta;
use meter_queue::{PoolTracker, QueueError};
use meter_scheduler::{AssignError, AssignmentHandler, HandlerError, StatusHandler};
use tracing::{debug, info};

use crate::credential::CredentialIssuer;
use crate::error::NotifyError;
use crate::notice::{GrantNotice, UpdateNotice};
use crate::signal::SignalClient;

/// Claims a recorder for the head request and tells the requester.
pub struct RecorderProcessor {
    tracker: Arc<PoolTracker>,
    signal: SignalClient,
    credentials: Arc<dyn CredentialIssuer>,
}

impl RecorderProcessor {
    pub fn new(
        tracker: Arc<PoolTracker>,
        signal: SignalClient,
        credentials: Arc<dyn CredentialIssuer>,
    ) -> Self {
        Self {
            tracker,
            signal,
            credentials,
        }
    }
}

#[async_trait]
impl AssignmentHandler for RecorderProcessor {
    async fn assign(&self, meta: &RequestMeta) -> Result<bool, AssignError> {
        let request_id = meta.request_id();
        let worker_id = match self.tracker.claim_available().await {
            Ok(id) => id,
            Err(QueueError::ResourceUnavailable) => {
                debug!(request_id, "no recorders");
                return Ok(false);
            }
            Err(e) => return Err(AssignError::Retry(e.to_string())),
        };

        let token = self
            .credentials
            .issue(meta)
            .map_err(|e| AssignError::Retry(e.to_string()))?;
        let notice = GrantNotice::new(&meta.request, token);

        match self
            .signal
            .post(&meta.request.external_api_url, &meta.request.room_param, &notice)
            .await
        {
            Ok(()) => {
                info!(request_id, worker_id = %worker_id, "recorder granted");
                Ok(true)
            }
            Err(NotifyError::ConferenceGone(room)) => {
                Err(AssignError::Terminal(format!("conference for room {room} no longer exists")))
            }
            Err(e) => Err(AssignError::Retry(e.to_string())),
        }
    }
}

#[async_trait]
impl StatusHandler for RecorderProcessor {
    async fn update(
        &self,
        meta: &RequestMeta,
        position: usize,
        wait_seconds: u64,
    ) -> Result<bool, HandlerError> {
        debug!(
            request_id = %meta.request_id(),
            position,
            wait_seconds,
            "request update"
        );
        let notice = UpdateNotice::new(&meta.request, position, wait_seconds);
        self.signal
            .post(&meta.request.external_api_url, &meta.request.room_param, &notice)
            .await?;
        Ok(true)
    }
}
