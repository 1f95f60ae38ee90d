//! Assignment loop: one dequeue attempt per tick.

use std::sync::Arc;
use std::time::Duration;

use meter_queue::{Assignment, DequeueOutcome, QueueError, RequestQueue};
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::handler::{AssignError, AssignmentHandler};
use crate::metrics::LoopMetrics;

pub struct SchedulerLoop {
    queue: Arc<RequestQueue>,
    handler: Arc<dyn AssignmentHandler>,
    interval: Duration,
    metrics: Arc<LoopMetrics>,
}

impl SchedulerLoop {
    pub fn new(
        queue: Arc<RequestQueue>,
        handler: Arc<dyn AssignmentHandler>,
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

    /// Offer the queue head to the handler once.
    pub async fn tick(&self) -> Result<DequeueOutcome, QueueError> {
        self.metrics.record_tick();
        let started = Instant::now();

        let handler = self.handler.clone();
        let result = self
            .queue
            .dequeue_if_assignable(|meta| async move {
                match handler.assign(&meta).await {
                    Ok(true) => Assignment::Assigned,
                    Ok(false) => Assignment::Declined,
                    Err(AssignError::Retry(reason)) => {
                        warn!(request_id = %meta.request_id(), reason = %reason, "assignment will be retried");
                        Assignment::Declined
                    }
                    Err(AssignError::Terminal(reason)) => {
                        warn!(request_id = %meta.request_id(), reason = %reason, "assignment rejected, withdrawing request");
                        Assignment::Withdrawn
                    }
                }
            })
            .await;

        let elapsed = started.elapsed();
        if elapsed > self.queue.lock_ttl() {
            self.metrics.record_slow_tick();
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                lock_ttl_ms = self.queue.lock_ttl().as_millis() as u64,
                "scheduler tick outlived the processing lock"
            );
        }

        match &result {
            Ok(DequeueOutcome::Assigned(id)) => {
                self.metrics.record_assigned();
                info!(request_id = %id, "request assigned");
            }
            Ok(DequeueOutcome::Withdrawn(_)) => self.metrics.record_withdrawn(),
            Ok(DequeueOutcome::Empty) | Ok(DequeueOutcome::Declined(_)) => self.metrics.record_idle(),
            Ok(DequeueOutcome::LockBusy) => self.metrics.record_lock_skipped(),
            Ok(DequeueOutcome::Orphan { evicted, .. }) => self.metrics.record_orphan(*evicted),
            Ok(DequeueOutcome::Panicked(_)) => self.metrics.record_error(),
            Err(e) => {
                self.metrics.record_error();
                error!(error = %e, "scheduler tick failed");
            }
        }
        result
    }

    /// Tick at a fixed interval until `shutdown` is notified.
    ///
    /// Stop with `notify_one`: the permit is kept if it arrives mid-tick.
    /// A tick in progress always runs to completion.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "scheduler loop started");

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = interval.tick() => {
                    // Errors are already logged and counted.
                    let _ = self.tick().await;
                }
            }
        }
        debug!("scheduler loop stopped");
    }
}
