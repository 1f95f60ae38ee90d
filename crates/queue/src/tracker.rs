//! Recorder pool availability, tracked as expiring leases.
//!
//! A worker is claimable while its idle lease exists and nobody holds its
//! pending lease. Both leases expire on their own; nothing here deletes a
//! pending lease.

use std::sync::Arc;
use std::time::Duration;

use meter_core::config::TrackerConfig;
use meter_core::WorkerReport;
use meter_store::LeaseStore;
use tracing::debug;

use crate::error::QueueError;
use crate::keys::KeySpace;

pub struct PoolTracker {
    store: Arc<dyn LeaseStore>,
    keys: KeySpace,
    idle_ttl: Duration,
    pending_ttl: Duration,
}

impl PoolTracker {
    pub fn new(store: Arc<dyn LeaseStore>, keys: KeySpace, cfg: &TrackerConfig) -> Self {
        Self {
            store,
            keys,
            idle_ttl: cfg.idle_ttl(),
            pending_ttl: cfg.pending_ttl(),
        }
    }

    /// Record one worker state report. Returns whether the worker is now
    /// marked idle.
    pub async fn report(&self, report: &WorkerReport) -> Result<bool, QueueError> {
        let key = self.keys.idle(&report.worker_id);
        if report.is_available() {
            self.store.set(&key, "1", Some(self.idle_ttl)).await?;
            debug!(worker_id = %report.worker_id, "idle lease refreshed");
            Ok(true)
        } else {
            self.store.delete(&key).await?;
            debug!(
                worker_id = %report.worker_id,
                busy = report.busy,
                healthy = report.healthy,
                "idle lease cleared"
            );
            Ok(false)
        }
    }

    /// Ids of every worker currently holding an idle lease, claimed or not.
    pub async fn idle_workers(&self) -> Result<Vec<String>, QueueError> {
        let keys = self.store.scan_prefix(&self.keys.idle_prefix()).await?;
        Ok(keys
            .iter()
            .filter_map(|k| self.keys.worker_from_idle(k))
            .map(str::to_string)
            .collect())
    }

    /// Reserve one idle worker by creating its pending lease.
    ///
    /// Candidates are tried in store order. Races with other instances are
    /// settled by the create-if-absent write alone.
    pub async fn claim_available(&self) -> Result<String, QueueError> {
        let candidates = self.idle_workers().await?;
        debug!(candidates = candidates.len(), "claiming recorder");

        for worker_id in candidates {
            let pending = self.keys.pending(&worker_id);
            if self
                .store
                .set_if_absent(&pending, "1", Some(self.pending_ttl))
                .await?
            {
                debug!(worker_id = %worker_id, "recorder claimed");
                return Ok(worker_id);
            }
            debug!(worker_id = %worker_id, "recorder already pending");
        }

        Err(QueueError::ResourceUnavailable)
    }
}
