//! In-Memory Lock Store - Single-Process TTL Locks
//!
//! A map behind a tokio mutex. Mutual exclusion holds only within this
//! process, which is enough for single-instance deployments and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::ports::lock_store::{LockRecord, LockStore};

/// In-process lock store.
pub struct MemoryLockStore {
    locks: Mutex<HashMap<String, LockRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> anyhow::Result<bool> {
        let mut locks = self.locks.lock().await;
        let now = Utc::now();
        match locks.get(key) {
            Some(record) if record.holder != holder && !record.is_expired_at(now) => Ok(false),
            _ => {
                locks.insert(
                    key.to_string(),
                    LockRecord {
                        holder: holder.to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, holder: &str) -> anyhow::Result<bool> {
        let mut locks = self.locks.lock().await;
        match locks.get(key) {
            Some(record) if record.holder == holder => {
                locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn peek(&self, key: &str) -> anyhow::Result<Option<LockRecord>> {
        Ok(self.locks.lock().await.get(key).cloned())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const TTL: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let store = MemoryLockStore::new();
        store.locks.lock().await.insert(
            "treasury-burn".to_string(),
            LockRecord {
                holder: "dead-process".to_string(),
                expires_at: Utc::now() - ChronoDuration::seconds(1),
            },
        );

        assert!(store.try_acquire("treasury-burn", "alive", TTL).await.unwrap());
        let record = store.peek("treasury-burn").await.unwrap().unwrap();
        assert_eq!(record.holder, "alive");
    }

    #[tokio::test]
    async fn test_release_by_wrong_holder_is_noop() {
        let store = MemoryLockStore::new();
        assert!(store.try_acquire("treasury-burn", "a", TTL).await.unwrap());
        assert!(!store.release("treasury-burn", "b").await.unwrap());
        assert!(store.peek("treasury-burn").await.unwrap().is_some());
    }
}
