//! Durable FIFO request queue.
//!
//! Each queued request is two store entries: its id in the ordered list and
//! a JSON metadata record. Both are written and removed in one transaction.
//! The head is only ever consumed under the processing lock, so instances
//! sharing a store never assign the same request twice.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use meter_core::config::QueueConfig;
use meter_core::{QueuePosition, RecorderRequest, RequestMeta};
use meter_store::{DistributedLock, LeaseStore, LockError, RetryPolicy, TxOp};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::QueueError;
use crate::keys::KeySpace;

/// What an assignment callback decided about the head request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Granted. The request is removed.
    Assigned,
    /// Not this time. The request stays at the head.
    Declined,
    /// Can never be granted. The request is removed without a grant.
    Withdrawn,
}

/// Result of one [`RequestQueue::dequeue_if_assignable`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DequeueOutcome {
    Empty,
    /// Another instance holds the processing lock. The tick is skipped.
    LockBusy,
    /// The head id has no metadata. `evicted` is set once the skip budget
    /// ran out and the id was dropped from the list.
    Orphan { request_id: String, evicted: bool },
    Assigned(String),
    Declined(String),
    Withdrawn(String),
    /// The callback panicked. Treated like `Declined`.
    Panicked(String),
}

impl DequeueOutcome {
    pub fn assigned(&self) -> bool {
        matches!(self, DequeueOutcome::Assigned(_))
    }
}

/// Consecutive skips of the same orphaned head, per process.
#[derive(Debug, Default)]
struct OrphanWatch {
    request_id: Option<String>,
    skips: u32,
}

impl OrphanWatch {
    fn record(&mut self, request_id: &str) -> u32 {
        if self.request_id.as_deref() == Some(request_id) {
            self.skips += 1;
        } else {
            self.request_id = Some(request_id.to_string());
            self.skips = 1;
        }
        self.skips
    }

    fn clear(&mut self) {
        self.request_id = None;
        self.skips = 0;
    }
}

pub struct RequestQueue {
    store: Arc<dyn LeaseStore>,
    keys: KeySpace,
    lock: DistributedLock,
    lock_ttl: Duration,
    meta_ttl: Duration,
    grace: chrono::Duration,
    max_orphan_skips: u32,
    orphans: Mutex<OrphanWatch>,
}

impl RequestQueue {
    pub fn new(store: Arc<dyn LeaseStore>, keys: KeySpace, cfg: &QueueConfig) -> Self {
        let lock = DistributedLock::new(store.clone(), RetryPolicy::from_config(cfg));
        Self {
            store,
            keys,
            lock,
            lock_ttl: cfg.lock_ttl(),
            meta_ttl: cfg.meta_ttl(),
            grace: chrono::Duration::from_std(cfg.update_grace()).unwrap_or(chrono::Duration::MAX),
            max_orphan_skips: cfg.max_orphan_skips,
            orphans: Mutex::new(OrphanWatch::default()),
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Append a request to the tail of the queue.
    pub async fn enqueue(&self, request: RecorderRequest) -> Result<RequestMeta, QueueError> {
        self.enqueue_at(request, Utc::now()).await
    }

    /// Append a request with an explicit creation time.
    pub async fn enqueue_at(
        &self,
        request: RecorderRequest,
        created: DateTime<Utc>,
    ) -> Result<RequestMeta, QueueError> {
        let meta = RequestMeta::new(request, created);
        let id = meta.request_id().to_string();
        let ops = vec![
            TxOp::ListPush {
                key: self.keys.queue(),
                value: id.clone(),
            },
            TxOp::Set {
                key: self.keys.request(&id),
                value: serde_json::to_string(&meta)?,
                ttl: Some(self.meta_ttl),
            },
        ];
        self.store.transact(ops).await.map_err(|e| {
            error!(request_id = %id, error = %e, "enqueue transaction failed");
            QueueError::from(e)
        })?;
        debug!(request_id = %id, "request queued");
        Ok(meta)
    }

    /// Withdraw a request. Unknown ids are a no-op.
    pub async fn cancel(&self, request_id: &str) -> Result<(), QueueError> {
        self.remove(request_id).await.map_err(|e| {
            error!(request_id, error = %e, "cancel transaction failed");
            e
        })?;
        debug!(request_id, "request cancelled");
        Ok(())
    }

    /// Number of ids in the list, orphans included.
    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.store.list_range(&self.keys.queue()).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.store.list_head(&self.keys.queue()).await?.is_none())
    }

    /// Metadata for one request, if it is still stored.
    pub async fn get(&self, request_id: &str) -> Result<Option<RequestMeta>, QueueError> {
        match self.store.get(&self.keys.request(request_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Queued ids whose metadata is gone or unreadable. Read-only.
    pub async fn orphans(&self) -> Result<Vec<String>, QueueError> {
        let ids = self.store.list_range(&self.keys.queue()).await?;
        let mut orphans = Vec::new();
        for id in ids {
            if self.load_meta(&id).await?.is_none() {
                orphans.push(id);
            }
        }
        Ok(orphans)
    }

    /// Offer the head request to `assign` while holding the processing lock.
    ///
    /// The request is removed only when `assign` returns
    /// [`Assignment::Assigned`] or [`Assignment::Withdrawn`]. A panic inside
    /// `assign` leaves the queue untouched. The lock is released on every
    /// path that returns.
    pub async fn dequeue_if_assignable<F, Fut>(&self, assign: F) -> Result<DequeueOutcome, QueueError>
    where
        F: FnOnce(RequestMeta) -> Fut,
        Fut: Future<Output = Assignment>,
    {
        let resource = self.keys.processing_lock();
        let guard = match self.lock.acquire(&resource, self.lock_ttl).await {
            Ok(guard) => guard,
            Err(LockError::NotAcquired { attempts, .. }) => {
                debug!(attempts, "processing lock busy, skipping tick");
                return Ok(DequeueOutcome::LockBusy);
            }
            Err(LockError::Store(e)) => return Err(e.into()),
        };

        let outcome = self.dequeue_locked(assign).await;

        if guard.is_expired() {
            warn!(
                lock_ttl_ms = self.lock_ttl.as_millis() as u64,
                "processing lock expired before the tick finished"
            );
        }
        if let Err(e) = self.lock.release(guard).await {
            error!(error = %e, "failed to release processing lock");
        }
        outcome
    }

    async fn dequeue_locked<F, Fut>(&self, assign: F) -> Result<DequeueOutcome, QueueError>
    where
        F: FnOnce(RequestMeta) -> Fut,
        Fut: Future<Output = Assignment>,
    {
        let Some(request_id) = self.store.list_head(&self.keys.queue()).await? else {
            debug!("no requests pending");
            return Ok(DequeueOutcome::Empty);
        };

        let Some(meta) = self.load_meta(&request_id).await? else {
            return self.skip_orphan(request_id).await;
        };
        self.orphans.lock().await.clear();

        debug!(request_id = %request_id, "servicing request");
        let decision = AssertUnwindSafe(async move { assign(meta).await })
            .catch_unwind()
            .await;

        match decision {
            Ok(Assignment::Assigned) => {
                self.pop(&request_id).await?;
                Ok(DequeueOutcome::Assigned(request_id))
            }
            Ok(Assignment::Withdrawn) => {
                self.pop(&request_id).await?;
                warn!(request_id = %request_id, "request withdrawn without a grant");
                Ok(DequeueOutcome::Withdrawn(request_id))
            }
            Ok(Assignment::Declined) => Ok(DequeueOutcome::Declined(request_id)),
            Err(_) => {
                error!(request_id = %request_id, "assignment callback panicked");
                Ok(DequeueOutcome::Panicked(request_id))
            }
        }
    }

    async fn skip_orphan(&self, request_id: String) -> Result<DequeueOutcome, QueueError> {
        let skips = self.orphans.lock().await.record(&request_id);

        if self.max_orphan_skips > 0 && skips > self.max_orphan_skips {
            self.remove(&request_id).await?;
            self.orphans.lock().await.clear();
            error!(
                request_id = %request_id,
                skips = skips - 1,
                "evicted orphaned queue head with no metadata"
            );
            return Ok(DequeueOutcome::Orphan {
                request_id,
                evicted: true,
            });
        }

        warn!(request_id = %request_id, skips, "no metadata for queue head, skipping");
        Ok(DequeueOutcome::Orphan {
            request_id,
            evicted: false,
        })
    }

    /// Remove after a grant or withdrawal. Failures here are loud: the
    /// callback already ran.
    async fn pop(&self, request_id: &str) -> Result<(), QueueError> {
        self.remove(request_id).await.map_err(|e| {
            error!(request_id, error = %e, "failed to remove assigned request");
            e
        })
    }

    async fn remove(&self, request_id: &str) -> Result<(), QueueError> {
        let ops = vec![
            TxOp::ListRemove {
                key: self.keys.queue(),
                value: request_id.to_string(),
            },
            TxOp::Delete {
                key: self.keys.request(request_id),
            },
        ];
        self.store.transact(ops).await?;
        Ok(())
    }

    async fn load_meta(&self, request_id: &str) -> Result<Option<RequestMeta>, QueueError> {
        let Some(raw) = self.store.get(&self.keys.request(request_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(request_id, error = %e, "unreadable request metadata");
                Ok(None)
            }
        }
    }

    /// Positions and wait times of every request queued for at least the
    /// grace period.
    pub async fn snapshot_positions(&self) -> Result<Vec<QueuePosition>, QueueError> {
        self.snapshot_positions_at(Utc::now()).await
    }

    /// [`snapshot_positions`](Self::snapshot_positions) as of `now`.
    ///
    /// Positions are indices into one list read; metadata is fetched after,
    /// so a request cancelled mid-snapshot is simply left out.
    pub async fn snapshot_positions_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueuePosition>, QueueError> {
        let ids = self.store.list_range(&self.keys.queue()).await?;
        let mut positions = Vec::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            let Some(meta) = self.load_meta(id).await? else {
                warn!(request_id = %id, "no metadata for queued request, update skipped");
                continue;
            };
            if now - meta.created < self.grace {
                continue;
            }
            let wait_seconds = meta.wait_seconds(now);
            positions.push(QueuePosition {
                meta,
                position,
                wait_seconds,
            });
        }
        Ok(positions)
    }
}
