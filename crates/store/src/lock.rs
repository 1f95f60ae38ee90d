//! Single-store distributed mutual exclusion with retry and jitter.
//!
//! A lock is a key holding a random token, written with create-if-absent
//! and a TTL. Release is compare-and-delete on the token, so a holder
//! whose lock already expired (and was taken by another instance) can
//! never release someone else's lock.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::LockError;
use crate::traits::LeaseStore;

/// Fixed slack added on top of the drift factor, mirroring Redlock.
const CLOCK_DRIFT_FLOOR: Duration = Duration::from_millis(2);

/// Acquisition retry budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retry_count: u32,
    pub retry_delay: Duration,
    /// Upper bound of the random delay added to each retry.
    pub retry_jitter: Duration,
    /// Fraction of the TTL reserved for clock drift.
    pub drift_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay: Duration::from_millis(200),
            retry_jitter: Duration::from_millis(200),
            drift_factor: 0.01,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &meter_core::config::QueueConfig) -> Self {
        Self {
            retry_count: cfg.lock_retry_count,
            retry_delay: Duration::from_millis(cfg.lock_retry_delay_ms),
            retry_jitter: Duration::from_millis(cfg.lock_retry_jitter_ms),
            ..Self::default()
        }
    }

    fn backoff(&self) -> Duration {
        let jitter_ms = self.retry_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.retry_delay + Duration::from_millis(jitter)
    }

    fn drift(&self, ttl: Duration) -> Duration {
        ttl.mul_f64(self.drift_factor) + CLOCK_DRIFT_FLOOR
    }
}

/// Proof of a held lock. Pass it back to [`DistributedLock::release`].
#[derive(Debug)]
pub struct LockGuard {
    resource: String,
    token: String,
    acquired_at: Instant,
    validity: Duration,
}

impl LockGuard {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Time left before another instance may take the lock.
    pub fn remaining(&self) -> Duration {
        self.validity.saturating_sub(self.acquired_at.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

pub struct DistributedLock {
    store: Arc<dyn LeaseStore>,
    policy: RetryPolicy,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn LeaseStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Try to take `resource` for `ttl`, retrying with backoff and jitter.
    ///
    /// An acquisition that took so long the lock is already (nearly)
    /// expired counts as a failed attempt and is released immediately.
    pub async fn acquire(&self, resource: &str, ttl: Duration) -> Result<LockGuard, LockError> {
        let token = Uuid::new_v4().to_string();
        let attempts = self.policy.retry_count + 1;

        for attempt in 1..=attempts {
            let started = Instant::now();
            if self.store.set_if_absent(resource, &token, Some(ttl)).await? {
                let spent = started.elapsed() + self.policy.drift(ttl);
                match ttl.checked_sub(spent) {
                    Some(validity) if !validity.is_zero() => {
                        debug!(resource, attempt, "lock acquired");
                        return Ok(LockGuard {
                            resource: resource.to_string(),
                            token,
                            acquired_at: started,
                            validity,
                        });
                    }
                    _ => {
                        warn!(resource, ?ttl, "lock acquired too late to be valid, releasing");
                        self.store.delete_if_equals(resource, &token).await?;
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff()).await;
            }
        }

        Err(LockError::NotAcquired {
            resource: resource.to_string(),
            attempts,
        })
    }

    /// Release a held lock. Returns `false` if it had already expired or
    /// been taken over.
    pub async fn release(&self, guard: LockGuard) -> Result<bool, LockError> {
        let released = self
            .store
            .delete_if_equals(&guard.resource, &guard.token)
            .await?;
        if !released {
            warn!(resource = %guard.resource, "lock was no longer held at release");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn no_retry() -> RetryPolicy {
        RetryPolicy {
            retry_count: 0,
            ..RetryPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquirer_is_refused_until_release() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store, no_retry());

        let guard = lock.acquire("proc", Duration::from_secs(1)).await.unwrap();
        let err = lock.acquire("proc", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LockError::NotAcquired { attempts: 1, .. }));

        assert!(lock.release(guard).await.unwrap());
        assert!(lock.acquire("proc", Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_holder_expires() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(
            store,
            RetryPolicy {
                retry_count: 3,
                retry_delay: Duration::from_millis(200),
                retry_jitter: Duration::ZERO,
                drift_factor: 0.01,
            },
        );

        let _held = lock.acquire("proc", Duration::from_millis(300)).await.unwrap();
        // Attempts at t=0, 200ms, 400ms: the third lands after expiry.
        let guard = lock.acquire("proc", Duration::from_millis(300)).await.unwrap();
        assert_eq!(guard.resource(), "proc");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_guard_cannot_release_new_holder() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store.clone(), no_retry());

        let stale = lock.acquire("proc", Duration::from_millis(100)).await.unwrap();
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(stale.is_expired());

        let fresh = lock.acquire("proc", Duration::from_secs(1)).await.unwrap();
        assert!(!lock.release(stale).await.unwrap());
        assert_eq!(
            store.get("proc").await.unwrap().as_deref(),
            Some(fresh.token())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn validity_accounts_for_drift() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store, no_retry());
        let guard = lock.acquire("proc", Duration::from_millis(1000)).await.unwrap();
        // 1% of 1000ms plus the 2ms floor.
        let remaining = guard.remaining().as_micros();
        assert!((987_900..=988_100).contains(&remaining), "got {remaining}us");
    }

    #[tokio::test]
    async fn ttl_shorter_than_drift_never_acquires() {
        let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store.clone(), no_retry());
        let err = lock.acquire("proc", Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, LockError::NotAcquired { .. }));
        assert_eq!(store.get("proc").await.unwrap(), None);
    }

    #[test]
    fn backoff_stays_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.backoff();
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(400));
        }
    }
}
