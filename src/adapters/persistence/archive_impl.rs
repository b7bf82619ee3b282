//! Archive Implementation — Concrete Adapter for the Archive Port
//!
//! Wraps `SettlementJournal` (JSONL append-only files) and
//! `CheckpointStore` (atomic JSON high-water mark) into a single struct
//! that implements the `SettlementArchive` trait from
//! `crate::ports::archive`.
//!
//! This is the hexagonal architecture glue: the usecases layer only
//! knows about the `SettlementArchive` trait, never about files or JSON.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::checkpoint::CheckpointStore;
use super::journal::SettlementJournal;
use crate::domain::settlement::{SettlementResult, SettlementStep};
use crate::ports::archive::{CheckpointRecord, SettlementArchive};

/// Concrete archive adapter combining journal and checkpoint persistence.
pub struct ArchiveImpl {
    /// JSONL settlement journal.
    journal: SettlementJournal,
    /// Atomic JSON checkpoint store.
    checkpoint: CheckpointStore,
}

impl ArchiveImpl {
    /// Create a new archive from existing journal and checkpoint instances.
    pub fn new(journal: SettlementJournal, checkpoint: CheckpointStore) -> Self {
        Self {
            journal,
            checkpoint,
        }
    }

    /// Create a new archive rooted at a data directory path.
    pub async fn from_data_dir(data_dir: &str) -> Result<Self> {
        let journal = SettlementJournal::new(data_dir).await?;
        let checkpoint = CheckpointStore::new(data_dir).await?;
        Ok(Self::new(journal, checkpoint))
    }
}

#[async_trait]
impl SettlementArchive for ArchiveImpl {
    async fn append_result(&self, result: &SettlementResult) -> Result<()> {
        self.journal.append(result).await
    }

    async fn load_results(&self) -> Result<Vec<SettlementResult>> {
        self.journal.load_all().await
    }

    async fn record_step(&self, run_id: Uuid, step: SettlementStep) -> Result<()> {
        self.checkpoint.mark(run_id, step).await
    }

    async fn clear_checkpoint(&self) -> Result<()> {
        self.checkpoint.clear().await
    }

    async fn interrupted_run(&self) -> Result<Option<CheckpointRecord>> {
        self.checkpoint.load().await
    }

    async fn is_healthy(&self) -> bool {
        self.journal.is_healthy().await && self.checkpoint.is_healthy().await
    }
}
