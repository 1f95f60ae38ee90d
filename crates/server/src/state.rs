use std::sync::Arc;

use meter_queue::{PoolTracker, RequestQueue};
use meter_scheduler::LoopMetrics;

/// Shared handler state. Everything durable lives in the lease store.
pub struct AppState {
    pub queue: Arc<RequestQueue>,
    pub tracker: Arc<PoolTracker>,
    pub metrics: Arc<LoopMetrics>,
    /// Store backend name, reported by `/health`.
    pub backend: String,
}
