//! No-op Lock Store - Locking Disabled
//!
//! Grants every acquisition and holds nothing. Selected with
//! `lock.backend = "disabled"` for deployments that are guaranteed
//! single-instance.

use std::time::Duration;

use async_trait::async_trait;

use crate::ports::lock_store::{LockRecord, LockStore};

pub struct NoopLockStore;

#[async_trait]
impl LockStore for NoopLockStore {
    async fn try_acquire(&self, _key: &str, _holder: &str, _ttl: Duration) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn release(&self, _key: &str, _holder: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn peek(&self, _key: &str) -> anyhow::Result<Option<LockRecord>> {
        Ok(None)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
