//! Persistence Adapters - JSONL-based File Storage
//!
//! Implements the SettlementArchive port using append-only JSONL files
//! for settlement runs and an atomic JSON checkpoint for the in-flight
//! run. No database dependency — lightweight and crash-recoverable.

pub mod archive_impl;
pub mod checkpoint;
pub mod journal;

pub use archive_impl::ArchiveImpl;
pub use checkpoint::CheckpointStore;
pub use journal::SettlementJournal;
