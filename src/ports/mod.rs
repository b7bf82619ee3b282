//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `Marketplace`: Listing source, ask creation, and sale polling
//! - `ChainClient`: Balances, ownership checks, and signed submission
//! - `SwapVenue`: DEX quote and wrap/approve/swap legs of settlement
//! - `LockStore`: Shared TTL lock backend
//! - `SettlementArchive`: Journal and checkpoint persistence (JSONL-based)

pub mod archive;
pub mod chain_client;
pub mod lock_store;
pub mod marketplace;
pub mod swap_venue;

pub use archive::{CheckpointRecord, SettlementArchive};
pub use chain_client::{CallOutcome, ChainClient};
pub use lock_store::{LockRecord, LockStore};
pub use marketplace::Marketplace;
pub use swap_venue::SwapVenue;
