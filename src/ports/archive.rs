//! Archive Port - Settlement Persistence Interface
//!
//! Defines the trait for persisting settlement outcomes using JSONL
//! plus a small checkpoint file. No database dependency - append-only
//! records for audit trails, and a high-water mark so an interrupted
//! run is reported instead of silently forgotten.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::settlement::{SettlementResult, SettlementStep};

/// High-water mark of a settlement run in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
  /// Run this checkpoint belongs to.
  pub run_id: Uuid,
  /// Last step whose transaction confirmed.
  pub step: SettlementStep,
  /// When the step was recorded.
  pub updated_at: DateTime<Utc>,
}

/// Trait for settlement persistence providers.
#[async_trait]
pub trait SettlementArchive: Send + Sync + 'static {
  /// Append a finished (complete or degraded) run to the journal.
  async fn append_result(&self, result: &SettlementResult) -> anyhow::Result<()>;

  /// Load all journaled results (for recovery/analysis).
  async fn load_results(&self) -> anyhow::Result<Vec<SettlementResult>>;

  /// Record that `step` of `run_id` confirmed. Overwrites the previous mark.
  async fn record_step(&self, run_id: Uuid, step: SettlementStep) -> anyhow::Result<()>;

  /// Clear the checkpoint after a run fully completes.
  async fn clear_checkpoint(&self) -> anyhow::Result<()>;

  /// The checkpoint left behind by an interrupted run, if any.
  async fn interrupted_run(&self) -> anyhow::Result<Option<CheckpointRecord>>;

  /// Check if the archive is healthy (disk space, permissions).
  async fn is_healthy(&self) -> bool;
}
