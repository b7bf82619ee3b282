//! Lock Store Port - Shared TTL Lock Backend Interface
//!
//! Defines the trait for the store behind the lock manager: atomic
//! set-if-absent with expiry, holder-checked release, and inspection.
//! Backends range from a shared file directory to a plain in-memory map;
//! the fail-open policy on store errors lives in the lock manager, not here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A currently-held lock as the store sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
  /// Opaque holder token (one per process instance).
  pub holder: String,
  /// When the lock lapses on its own.
  pub expires_at: DateTime<Utc>,
}

impl LockRecord {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.expires_at <= now
  }
}

/// Trait for shared lock storage.
#[async_trait]
pub trait LockStore: Send + Sync + 'static {
  /// Atomically acquire `key` for `holder` with the given TTL.
  ///
  /// Returns `true` when this call took the lock, `false` when another
  /// holder has it and it has not yet expired. Re-acquiring a key
  /// already held by the same holder refreshes the TTL.
  async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> anyhow::Result<bool>;

  /// Release `key` if currently held by `holder`.
  ///
  /// Returns `true` when a lock was actually removed. Releasing an
  /// unheld or expired lock is a no-op, not an error.
  async fn release(&self, key: &str, holder: &str) -> anyhow::Result<bool>;

  /// Inspect the current record for `key`, expired or not.
  async fn peek(&self, key: &str) -> anyhow::Result<Option<LockRecord>>;

  /// Check if the store backend is reachable.
  async fn is_healthy(&self) -> bool;
}
