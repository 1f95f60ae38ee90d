use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters shared by both loops of one process.
#[derive(Debug, Default)]
pub struct LoopMetrics {
    ticks: AtomicU64,
    assigned: AtomicU64,
    withdrawn: AtomicU64,
    idle: AtomicU64,
    lock_skipped: AtomicU64,
    errors: AtomicU64,
    orphan_skips: AtomicU64,
    orphans_evicted: AtomicU64,
    slow_ticks: AtomicU64,
    update_ticks: AtomicU64,
    updates_sent: AtomicU64,
    updates_failed: AtomicU64,
}

/// Point-in-time copy of [`LoopMetrics`] for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub assigned: u64,
    pub withdrawn: u64,
    pub idle: u64,
    pub lock_skipped: u64,
    pub errors: u64,
    pub orphan_skips: u64,
    pub orphans_evicted: u64,
    pub slow_ticks: u64,
    pub update_ticks: u64,
    pub updates_sent: u64,
    pub updates_failed: u64,
    pub captured_at: DateTime<Utc>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        bump(&self.ticks);
    }

    pub fn record_assigned(&self) {
        bump(&self.assigned);
    }

    pub fn record_withdrawn(&self) {
        bump(&self.withdrawn);
    }

    pub fn record_idle(&self) {
        bump(&self.idle);
    }

    pub fn record_lock_skipped(&self) {
        bump(&self.lock_skipped);
    }

    pub fn record_error(&self) {
        bump(&self.errors);
    }

    pub fn record_orphan(&self, evicted: bool) {
        if evicted {
            bump(&self.orphans_evicted);
        } else {
            bump(&self.orphan_skips);
        }
    }

    pub fn record_slow_tick(&self) {
        bump(&self.slow_ticks);
    }

    pub fn record_update_tick(&self, sent: u64, failed: u64) {
        bump(&self.update_ticks);
        self.updates_sent.fetch_add(sent, Ordering::Relaxed);
        self.updates_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            ticks: load(&self.ticks),
            assigned: load(&self.assigned),
            withdrawn: load(&self.withdrawn),
            idle: load(&self.idle),
            lock_skipped: load(&self.lock_skipped),
            errors: load(&self.errors),
            orphan_skips: load(&self.orphan_skips),
            orphans_evicted: load(&self.orphans_evicted),
            slow_ticks: load(&self.slow_ticks),
            update_ticks: load(&self.update_ticks),
            updates_sent: load(&self.updates_sent),
            updates_failed: load(&self.updates_failed),
            captured_at: Utc::now(),
        }
    }
}
