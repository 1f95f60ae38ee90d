//! Several instances sharing one store: at most one holds the lock at a time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meter_store::{DistributedLock, LeaseStore, LockError, MemoryStore, RetryPolicy};

#[tokio::test(start_paused = true)]
async fn concurrent_instances_never_overlap() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
    let inside = Arc::new(AtomicU32::new(0));
    let max_seen = Arc::new(AtomicU32::new(0));
    let wins = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let lock = DistributedLock::new(
            store.clone(),
            RetryPolicy {
                retry_count: 10,
                retry_delay: Duration::from_millis(50),
                retry_jitter: Duration::from_millis(20),
                drift_factor: 0.01,
            },
        );
        let inside = inside.clone();
        let max_seen = max_seen.clone();
        let wins = wins.clone();
        handles.push(tokio::spawn(async move {
            match lock.acquire("recorder:lock:processing", Duration::from_secs(1)).await {
                Ok(guard) => {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    wins.fetch_add(1, Ordering::SeqCst);
                    lock.release(guard).await.unwrap();
                }
                Err(LockError::NotAcquired { .. }) => {}
                Err(e) => panic!("unexpected lock error: {e}"),
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    // Holders release after 30ms and contenders retry every 50-70ms for
    // 10 rounds, so everybody eventually gets a turn.
    assert_eq!(wins.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn crashed_holder_lock_lapses_after_ttl() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::new());
    let crashed = DistributedLock::new(store.clone(), RetryPolicy::default());
    let guard = crashed
        .acquire("recorder:lock:processing", Duration::from_millis(500))
        .await
        .unwrap();
    // Never released.
    std::mem::forget(guard);

    let survivor = DistributedLock::new(
        store,
        RetryPolicy {
            retry_count: 0,
            ..RetryPolicy::default()
        },
    );
    assert!(survivor
        .acquire("recorder:lock:processing", Duration::from_millis(500))
        .await
        .is_err());

    tokio::time::advance(Duration::from_millis(500)).await;
    assert!(survivor
        .acquire("recorder:lock:processing", Duration::from_millis(500))
        .await
        .is_ok());
}
