//! Lock Store Tests - TTL Windows and Mutual Exclusion
//!
//! Exercises the lock backends against the properties the settlement
//! engine depends on: a single winner under contention, the TTL
//! boundary, expired-lock takeover, and release semantics.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;

use nft_flywheel_bot::adapters::locks::{FileLockStore, MemoryLockStore, NoopLockStore};
use nft_flywheel_bot::ports::lock_store::{LockRecord, LockStore};
use nft_flywheel_bot::usecases::lock_manager::LockManager;

const KEY: &str = "treasury-burn";
const TTL: Duration = Duration::from_secs(600);

fn temp_lock_dir() -> String {
    std::env::temp_dir()
        .join(format!("flywheel-lock-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_ttl_window_boundary() {
    // A 600s lock acquired at T is still blocking at T+599s and has
    // lapsed by T+601s.
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let record = LockRecord {
        holder: "instance-a".to_string(),
        expires_at: t0 + chrono::Duration::seconds(600),
    };

    assert!(!record.is_expired_at(t0 + chrono::Duration::seconds(599)));
    assert!(record.is_expired_at(t0 + chrono::Duration::seconds(601)));
}

#[tokio::test]
async fn test_concurrent_acquire_has_single_winner() {
    let store = Arc::new(MemoryLockStore::new());

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.try_acquire(KEY, &format!("instance-{i}"), TTL).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_expired_memory_lock_is_taken_over() {
    let store = MemoryLockStore::new();

    // A zero TTL expires immediately; the next holder displaces it.
    assert!(store
        .try_acquire(KEY, "dead-process", Duration::ZERO)
        .await
        .unwrap());
    assert!(store.try_acquire(KEY, "alive", TTL).await.unwrap());

    let record = store.peek(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, "alive");
}

#[tokio::test]
async fn test_unexpired_memory_lock_blocks_other_holders() {
    let store = MemoryLockStore::new();

    assert!(store.try_acquire(KEY, "a", TTL).await.unwrap());
    assert!(!store.try_acquire(KEY, "b", TTL).await.unwrap());

    // Release by the wrong holder changes nothing.
    assert!(!store.release(KEY, "b").await.unwrap());
    assert!(!store.try_acquire(KEY, "b", TTL).await.unwrap());

    // Release by the holder frees it.
    assert!(store.release(KEY, "a").await.unwrap());
    assert!(store.try_acquire(KEY, "b", TTL).await.unwrap());
}

#[tokio::test]
async fn test_file_store_roundtrip_across_instances() {
    let dir = temp_lock_dir();
    // Two store instances over the same directory model two processes.
    let a = FileLockStore::new(&dir).await.unwrap();
    let b = FileLockStore::new(&dir).await.unwrap();

    assert!(a.try_acquire(KEY, "proc-a", TTL).await.unwrap());
    assert!(!b.try_acquire(KEY, "proc-b", TTL).await.unwrap());

    let record = b.peek(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, "proc-a");

    assert!(a.release(KEY, "proc-a").await.unwrap());
    assert!(b.try_acquire(KEY, "proc-b", TTL).await.unwrap());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_file_store_takes_over_expired_lock() {
    let dir = temp_lock_dir();
    let store = FileLockStore::new(&dir).await.unwrap();

    assert!(store
        .try_acquire(KEY, "crashed", Duration::ZERO)
        .await
        .unwrap());
    assert!(store.try_acquire(KEY, "recovered", TTL).await.unwrap());

    let record = store.peek(KEY).await.unwrap().unwrap();
    assert_eq!(record.holder, "recovered");

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_file_store_same_holder_refreshes_ttl() {
    let dir = temp_lock_dir();
    let store = FileLockStore::new(&dir).await.unwrap();

    assert!(store.try_acquire(KEY, "proc-a", TTL).await.unwrap());
    let first = store.peek(KEY).await.unwrap().unwrap();

    assert!(store.try_acquire(KEY, "proc-a", TTL).await.unwrap());
    let second = store.peek(KEY).await.unwrap().unwrap();

    assert_eq!(second.holder, "proc-a");
    assert!(second.expires_at >= first.expires_at);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_noop_store_grants_everything() {
    // The explicitly-disabled backend: every acquire wins, nothing
    // is ever held. Mutual exclusion is knowingly gone.
    let store = NoopLockStore;

    assert!(store.try_acquire(KEY, "a", TTL).await.unwrap());
    assert!(store.try_acquire(KEY, "b", TTL).await.unwrap());
    assert!(store.peek(KEY).await.unwrap().is_none());
    assert!(!store.release(KEY, "a").await.unwrap());
}

#[tokio::test]
async fn test_manager_exclusion_across_instances() {
    // Two lock managers sharing a store: only one can hold the key,
    // and a release hands it over cleanly.
    let (events_tx, _events_rx) = broadcast::channel(16);
    let store: Arc<dyn LockStore> = Arc::new(MemoryLockStore::new());

    let a = LockManager::new(Arc::clone(&store), 600, events_tx.clone());
    let b = LockManager::new(Arc::clone(&store), 600, events_tx);

    assert!(a.acquire(KEY).await);
    assert!(!b.acquire(KEY).await);
    assert!(a.held(KEY).await);
    assert!(b.held(KEY).await);

    a.release(KEY).await;
    assert!(!a.held(KEY).await);
    assert!(b.acquire(KEY).await);
}
