//! Status loop: tell every waiting requester its position.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use meter_core::QueuePosition;
use meter_queue::{QueueError, RequestQueue};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::handler::StatusHandler;
use crate::metrics::LoopMetrics;

pub struct UpdateLoop {
    queue: Arc<RequestQueue>,
    handler: Arc<dyn StatusHandler>,
    interval: Duration,
    metrics: Arc<LoopMetrics>,
}

impl UpdateLoop {
    pub fn new(
        queue: Arc<RequestQueue>,
        handler: Arc<dyn StatusHandler>,
        interval: Duration,
        metrics: Arc<LoopMetrics>,
    ) -> Self {
        Self {
            queue,
            handler,
            interval,
            metrics,
        }
    }

    /// Send one round of updates. Returns how many were delivered.
    ///
    /// Every entry is attempted; a failing or panicking update only costs
    /// its own entry.
    pub async fn tick(&self) -> Result<usize, QueueError> {
        let positions = match self.queue.snapshot_positions().await {
            Ok(p) => p,
            Err(e) => {
                self.metrics.record_error();
                error!(error = %e, "queue snapshot failed");
                return Err(e);
            }
        };
        if positions.is_empty() {
            debug!("no updates to send");
            self.metrics.record_update_tick(0, 0);
            return Ok(0);
        }

        let results = join_all(positions.iter().map(|p| self.deliver(p))).await;
        let sent = results.iter().filter(|ok| **ok).count();
        let failed = results.len() - sent;
        self.metrics.record_update_tick(sent as u64, failed as u64);
        debug!(sent, failed, "queue updates delivered");
        Ok(sent)
    }

    async fn deliver(&self, p: &QueuePosition) -> bool {
        let id = p.meta.request_id();
        let attempt = AssertUnwindSafe(self.handler.update(&p.meta, p.position, p.wait_seconds))
            .catch_unwind()
            .await;
        match attempt {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                debug!(request_id = %id, "update not delivered");
                false
            }
            Ok(Err(e)) => {
                warn!(request_id = %id, error = %e, "update failed");
                false
            }
            Err(_) => {
                error!(request_id = %id, "status handler panicked");
                false
            }
        }
    }

    /// Tick at a fixed interval until `shutdown` is notified (`notify_one`).
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "update loop started");

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = interval.tick() => {
                    let _ = self.tick().await;
                }
            }
        }
        debug!("update loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use meter_core::config::QueueConfig;
    use meter_core::{RecorderRequest, RequestMeta};
    use meter_queue::KeySpace;
    use meter_store::{LeaseStore, MemoryStore};
    use std::sync::Mutex;

    use crate::handler::HandlerError;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl StatusHandler for Recording {
        async fn update(
            &self,
            meta: &RequestMeta,
            position: usize,
            _wait_seconds: u64,
        ) -> Result<bool, HandlerError> {
            let id = meta.request_id().to_string();
            self.seen.lock().unwrap().push((id.clone(), position));
            match id.as_str() {
                "bad" => Err("signal api unreachable".into()),
                "boom" => panic!("handler bug"),
                _ => Ok(true),
            }
        }
    }

    fn request(id: &str) -> RecorderRequest {
        RecorderRequest {
            request_id: id.to_string(),
            conference: String::new(),
            room_param: String::new(),
            external_api_url: String::new(),
            event_type: String::new(),
            participant: String::new(),
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_others() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
        let queue = Arc::new(RequestQueue::new(store, KeySpace::default(), &QueueConfig::default()));
        let old = Utc::now() - chrono::Duration::seconds(60);
        for id in ["a", "bad", "boom", "d"] {
            queue.enqueue_at(request(id), old).await.unwrap();
        }
        // Inside the grace window, not reported.
        queue.enqueue(request("fresh")).await.unwrap();

        let handler = Arc::new(Recording::default());
        let metrics = Arc::new(LoopMetrics::new());
        let updates = UpdateLoop::new(queue, handler.clone(), Duration::from_secs(3), metrics.clone());

        assert_eq!(updates.tick().await.unwrap(), 2);

        let mut seen = handler.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 0),
                ("bad".to_string(), 1),
                ("boom".to_string(), 2),
                ("d".to_string(), 3),
            ]
        );
        let m = metrics.snapshot();
        assert_eq!((m.updates_sent, m.updates_failed), (2, 2));
    }

    #[tokio::test]
    async fn empty_queue_sends_nothing() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
        let queue = Arc::new(RequestQueue::new(store, KeySpace::default(), &QueueConfig::default()));
        let updates = UpdateLoop::new(
            queue,
            Arc::new(Recording::default()),
            Duration::from_secs(3),
            Arc::new(LoopMetrics::new()),
        );
        assert_eq!(updates.tick().await.unwrap(), 0);
    }
}
