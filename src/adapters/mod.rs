//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, blockchain RPC, file I/O).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: marketplace gateway REST client and auth
//! - `chain`: EVM interaction via alloy-rs (balances, fulfillment, swap)
//! - `locks`: TTL lock store backends (file, memory, disabled)
//! - `metrics`: Prometheus export, health recorder and probes
//! - `persistence`: JSONL settlement journal and checkpoint

pub mod api;
pub mod chain;
pub mod locks;
pub mod metrics;
pub mod persistence;
