//! Lock Manager - Named TTL Locks with a Fail-Open Policy
//!
//! Wraps the shared lock store with this process's holder identity and
//! the configured TTL. The TTL bounds how long a crashed holder can
//! block others; release is explicit on the happy path.
//!
//! Availability beats strict mutual exclusion here: when the store
//! itself errors, `acquire` grants the lock anyway, logs loudly and
//! publishes a `LockFailOpen` event so the degradation is visible.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::events::FlywheelEvent;
use crate::ports::lock_store::LockStore;

/// Lock manager bound to one process instance.
pub struct LockManager {
  store: Arc<dyn LockStore>,
  /// Holder token unique to this process instance.
  holder: String,
  /// Default TTL applied by `acquire`.
  ttl: Duration,
  events: broadcast::Sender<FlywheelEvent>,
}

impl LockManager {
  pub fn new(
    store: Arc<dyn LockStore>,
    ttl_seconds: u64,
    events: broadcast::Sender<FlywheelEvent>,
  ) -> Self {
    Self {
      store,
      holder: Uuid::new_v4().to_string(),
      ttl: Duration::from_secs(ttl_seconds),
      events,
    }
  }

  /// This instance's holder token.
  pub fn holder(&self) -> &str {
    &self.holder
  }

  /// Acquire `key` with the configured TTL.
  pub async fn acquire(&self, key: &str) -> bool {
    self.acquire_with_ttl(key, self.ttl).await
  }

  /// Acquire `key` with an explicit TTL.
  ///
  /// `false` means another live holder has it. A store error grants the
  /// lock fail-open.
  pub async fn acquire_with_ttl(&self, key: &str, ttl: Duration) -> bool {
    match self.store.try_acquire(key, &self.holder, ttl).await {
      Ok(granted) => {
        debug!(key, granted, ttl_secs = ttl.as_secs(), "Lock acquisition attempt");
        granted
      }
      Err(e) => {
        warn!(
          key,
          error = %e,
          "Lock store unreachable, proceeding fail-open"
        );
        let _ = self
          .events
          .send(FlywheelEvent::LockFailOpen { key: key.to_string() });
        true
      }
    }
  }

  /// Release `key` if we hold it. Best-effort: a store error is logged
  /// and swallowed, since the TTL reclaims the lock regardless.
  pub async fn release(&self, key: &str) {
    match self.store.release(key, &self.holder).await {
      Ok(released) => {
        debug!(key, released, "Lock release attempt");
      }
      Err(e) => {
        warn!(key, error = %e, "Lock release failed, TTL will reclaim");
      }
    }
  }

  /// Whether any live (unexpired) holder currently has `key`.
  ///
  /// Errs on the side of not blocking: a store error reports `false`.
  pub async fn held(&self, key: &str) -> bool {
    match self.store.peek(key).await {
      Ok(Some(record)) => !record.is_expired_at(chrono::Utc::now()),
      Ok(None) => false,
      Err(e) => {
        warn!(key, error = %e, "Lock peek failed, reporting unheld");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::locks::memory::MemoryLockStore;
  use crate::ports::lock_store::LockRecord;
  use async_trait::async_trait;

  struct BrokenStore;

  #[async_trait]
  impl LockStore for BrokenStore {
    async fn try_acquire(&self, _: &str, _: &str, _: Duration) -> anyhow::Result<bool> {
      anyhow::bail!("store down")
    }

    async fn release(&self, _: &str, _: &str) -> anyhow::Result<bool> {
      anyhow::bail!("store down")
    }

    async fn peek(&self, _: &str) -> anyhow::Result<Option<LockRecord>> {
      anyhow::bail!("store down")
    }

    async fn is_healthy(&self) -> bool {
      false
    }
  }

  fn manager(store: Arc<dyn LockStore>) -> LockManager {
    let (tx, _rx) = broadcast::channel(16);
    LockManager::new(store, 600, tx)
  }

  #[tokio::test]
  async fn test_acquire_and_release_roundtrip() {
    let mgr = manager(Arc::new(MemoryLockStore::new()));
    assert!(mgr.acquire("treasury-burn").await);
    assert!(mgr.held("treasury-burn").await);
    mgr.release("treasury-burn").await;
    assert!(!mgr.held("treasury-burn").await);
  }

  #[tokio::test]
  async fn test_second_manager_blocked_while_held() {
    let store: Arc<dyn LockStore> = Arc::new(MemoryLockStore::new());
    let a = manager(Arc::clone(&store));
    let b = manager(Arc::clone(&store));
    assert!(a.acquire("treasury-burn").await);
    assert!(!b.acquire("treasury-burn").await);
    a.release("treasury-burn").await;
    assert!(b.acquire("treasury-burn").await);
  }

  #[tokio::test]
  async fn test_reacquire_by_same_holder_refreshes() {
    let mgr = manager(Arc::new(MemoryLockStore::new()));
    assert!(mgr.acquire("treasury-burn").await);
    assert!(mgr.acquire("treasury-burn").await);
  }

  #[tokio::test]
  async fn test_fail_open_when_store_errors() {
    let (tx, mut rx) = broadcast::channel(16);
    let mgr = LockManager::new(Arc::new(BrokenStore), 600, tx);
    assert!(mgr.acquire("treasury-burn").await);
    assert!(!mgr.held("treasury-burn").await);
    match rx.try_recv() {
      Ok(FlywheelEvent::LockFailOpen { key }) => assert_eq!(key, "treasury-burn"),
      other => panic!("expected LockFailOpen, got {other:?}"),
    }
  }
}
