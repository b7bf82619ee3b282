//! Settlement Journal - Append-only JSONL Run Records
//!
//! Persists settlement results to monthly JSONL files in the format
//! `settlements/YYYY-MM.jsonl`. Each line is a self-contained JSON
//! record for easy parsing, streaming, and audit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use crate::domain::settlement::SettlementResult;

/// Append-only JSONL journal with monthly file rotation.
///
/// Settlement files are named `settlements/YYYY-MM.jsonl` and each line
/// is a complete JSON object. Runs are rare compared to trades, so a
/// month per file keeps directories small without losing partitioning.
pub struct SettlementJournal {
    /// Base directory for settlement files.
    settlements_dir: PathBuf,
}

impl SettlementJournal {
    /// Create a new journal in the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let settlements_dir = Path::new(data_dir).join("settlements");
        fs::create_dir_all(&settlements_dir)
            .await
            .context("Failed to create settlements directory")?;
        Ok(Self { settlements_dir })
    }

    /// Append a settlement result to this month's JSONL file.
    #[instrument(skip(self, result), fields(run = %result.run_id))]
    pub async fn append(&self, result: &SettlementResult) -> Result<()> {
        let month = Utc::now().format("%Y-%m").to_string();
        let path = self.settlements_dir.join(format!("{month}.jsonl"));

        let mut json =
            serde_json::to_string(result).context("Failed to serialize settlement result")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open settlement journal")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write settlement result")?;
        file.flush().await.context("Failed to flush settlement journal")?;

        Ok(())
    }

    /// Load all journaled results across all monthly files.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<SettlementResult>> {
        let mut results = Vec::new();
        let mut entries = fs::read_dir(&self.settlements_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                let content = fs::read_to_string(&path).await?;
                for line in content.lines() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<SettlementResult>(line) {
                        Ok(result) => results.push(result),
                        Err(e) => {
                            tracing::warn!(
                                file = %path.display(),
                                error = %e,
                                "Skipping malformed settlement record"
                            );
                        }
                    }
                }
            }
        }

        results.sort_by_key(|r| r.completed_at);
        info!(count = results.len(), "Loaded settlement records");
        Ok(results)
    }

    /// Check if the settlements directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let test_path = self.settlements_dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}
