//! Shared lease store and distributed lock.
//!
//! Every service instance talks to the same [`LeaseStore`]; the queue,
//! the pool tracker, and the scheduler lock are all built on it.

pub mod error;
pub mod lock;
pub mod memory;
#[cfg(feature = "store-redis")]
pub mod redis_store;
pub mod traits;

use std::sync::Arc;

use meter_core::config::StoreConfig;
use tracing::info;

pub use error::{LockError, StoreError};
pub use lock::{DistributedLock, LockGuard, RetryPolicy};
pub use memory::MemoryStore;
#[cfg(feature = "store-redis")]
pub use redis_store::RedisStore;
pub use traits::{LeaseStore, TxOp};

/// Build the store named by `cfg.backend`.
pub async fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn LeaseStore>, StoreError> {
    let store: Arc<dyn LeaseStore> = match cfg.backend.as_str() {
        "memory" => Arc::new(MemoryStore::new()),
        "redis" => open_redis(&cfg.redis_url).await?,
        other => {
            return Err(StoreError::Connection(format!(
                "unknown store backend '{other}', supported: memory, redis"
            )))
        }
    };
    info!(backend = store.backend_name(), namespace = %cfg.namespace, "lease store ready");
    Ok(store)
}

#[cfg(feature = "store-redis")]
async fn open_redis(url: &str) -> Result<Arc<dyn LeaseStore>, StoreError> {
    Ok(Arc::new(RedisStore::connect(url).await?))
}

#[cfg(not(feature = "store-redis"))]
async fn open_redis(_url: &str) -> Result<Arc<dyn LeaseStore>, StoreError> {
    Err(StoreError::Connection(
        "redis store backend requires the 'store-redis' Cargo feature".into(),
    ))
}
