//! Lock Adapters - TTL Lock Store Backends
//!
//! Implements the `LockStore` port. Backends:
//! - `file`: one JSON file per key in a shared directory, acquired
//!   with exclusive-create
//! - `memory`: in-process map for single-instance runs and tests
//! - `disabled`: grants everything

pub mod file_store;
pub mod memory;
pub mod noop;

pub use file_store::FileLockStore;
pub use memory::MemoryLockStore;
pub use noop::NoopLockStore;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{LockBackend, LockConfig};
use crate::ports::lock_store::LockStore;

/// Build the lock store selected by configuration.
pub async fn build_lock_store(config: &LockConfig) -> Result<Arc<dyn LockStore>> {
    let store: Arc<dyn LockStore> = match config.backend {
        LockBackend::File => Arc::new(FileLockStore::new(&config.dir).await?),
        LockBackend::Memory => Arc::new(MemoryLockStore::new()),
        LockBackend::Disabled => Arc::new(NoopLockStore),
    };
    Ok(store)
}
