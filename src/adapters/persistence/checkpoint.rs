//! Checkpoint Store - Atomic JSON Settlement High-Water Mark
//!
//! Saves the last confirmed settlement step to `checkpoint.json` using
//! atomic writes (write to tmp file, then rename). The file exists
//! only while a run is in flight; finding one at startup means the
//! previous process died mid-pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::settlement::SettlementStep;
use crate::ports::archive::CheckpointRecord;

/// Atomic JSON checkpoint store for interrupted-run detection.
///
/// The mark is written to a temporary file first, then atomically
/// renamed to `checkpoint.json`, so the file is always either the old
/// or new version, never a partial write.
pub struct CheckpointStore {
    /// Path to checkpoint.json.
    checkpoint_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl CheckpointStore {
    /// Create a new checkpoint store in the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            checkpoint_path: dir.join("checkpoint.json"),
            tmp_path: dir.join("checkpoint.json.tmp"),
        })
    }

    /// Record `step` as the high-water mark of `run_id` (tmp → rename).
    #[instrument(skip(self), fields(run = %run_id, step = %step))]
    pub async fn mark(&self, run_id: Uuid, step: SettlementStep) -> Result<()> {
        let record = CheckpointRecord {
            run_id,
            step,
            updated_at: Utc::now(),
        };
        let json =
            serde_json::to_string_pretty(&record).context("Failed to serialize checkpoint")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp checkpoint file")?;
        fs::rename(&self.tmp_path, &self.checkpoint_path)
            .await
            .context("Failed to rename checkpoint file")?;

        Ok(())
    }

    /// Load the checkpoint, if one exists.
    pub async fn load(&self) -> Result<Option<CheckpointRecord>> {
        if !self.checkpoint_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.checkpoint_path)
            .await
            .context("Failed to read checkpoint file")?;
        let record =
            serde_json::from_str(&json).context("Failed to parse checkpoint JSON")?;

        Ok(Some(record))
    }

    /// Remove the checkpoint once a run has fully completed.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.checkpoint_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove checkpoint file"),
        }
    }

    /// Check if the checkpoint file location is usable.
    pub async fn is_healthy(&self) -> bool {
        if !self.checkpoint_path.exists() {
            return true;
        }
        fs::metadata(&self.checkpoint_path).await.is_ok()
    }
}
