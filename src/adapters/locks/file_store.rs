//! File Lock Store - Shared-Directory TTL Locks
//!
//! One JSON file per lock key, created with `create_new` so acquisition
//! is atomic wherever exclusive-create is. Taking over an expired lock
//! is a delete-then-recreate; that window is serialized by an internal
//! mutex within this process only, so two separate processes racing the
//! same expired lock can in principle both win the takeover.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::ports::lock_store::{LockRecord, LockStore};

/// Lock store backed by a shared directory of `<key>.lock` files.
pub struct FileLockStore {
    dir: PathBuf,
    /// Serializes takeover and release within this process.
    takeover: Mutex<()>,
}

impl FileLockStore {
    /// Create a file lock store, creating the directory if needed.
    pub async fn new(dir: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .context("Failed to create lock directory")?;
        Ok(Self {
            dir: PathBuf::from(dir),
            takeover: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are short identifiers; anything path-hostile is flattened.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.lock"))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<LockRecord>> {
        match fs::read_to_string(path).await {
            Ok(json) => {
                let record =
                    serde_json::from_str(&json).context("Failed to parse lock file")?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read lock file"),
        }
    }

    /// Exclusive-create the lock file. `false` means it already exists.
    async fn write_exclusive(&self, path: &Path, holder: &str, ttl: Duration) -> Result<bool> {
        let record = LockRecord {
            holder: holder.to_string(),
            expires_at: Utc::now() + ttl,
        };
        let json =
            serde_json::to_string_pretty(&record).context("Failed to serialize lock record")?;

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .await
                    .context("Failed to write lock file")?;
                file.flush().await.context("Failed to flush lock file")?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).context("Failed to create lock file"),
        }
    }
}

#[async_trait]
impl LockStore for FileLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> anyhow::Result<bool> {
        let path = self.path_for(key);

        // Fast path: no lock file yet.
        if self.write_exclusive(&path, holder, ttl).await? {
            return Ok(true);
        }

        // Occupied: the same holder refreshes, an expired holder is displaced.
        let _guard = self.takeover.lock().await;
        let Some(existing) = self.read_record(&path).await? else {
            return self.write_exclusive(&path, holder, ttl).await;
        };
        if existing.holder != holder && !existing.is_expired_at(Utc::now()) {
            return Ok(false);
        }
        fs::remove_file(&path)
            .await
            .context("Failed to displace lock file")?;
        self.write_exclusive(&path, holder, ttl).await
    }

    async fn release(&self, key: &str, holder: &str) -> anyhow::Result<bool> {
        let path = self.path_for(key);
        let _guard = self.takeover.lock().await;
        match self.read_record(&path).await? {
            Some(record) if record.holder == holder => {
                fs::remove_file(&path)
                    .await
                    .context("Failed to remove lock file")?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn peek(&self, key: &str) -> anyhow::Result<Option<LockRecord>> {
        self.read_record(&self.path_for(key)).await
    }

    async fn is_healthy(&self) -> bool {
        let test_path = self.dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}
