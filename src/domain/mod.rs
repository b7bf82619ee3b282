//! Domain layer - Core business logic and models.
//!
//! Pure flywheel domain: listings and positions, the relist/affordability
//! pricing rules, the treasury burn partition, and the failure taxonomy.
//! No I/O here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod events;
pub mod failure;
pub mod flywheel;
pub mod settlement;

// Re-export core types for convenience
pub use events::{AccountKind, FlywheelEvent, SettlementSkip};
pub use failure::FailureKind;
pub use flywheel::{
    CycleOutcome, FulfillmentCall, Listing, ListingId, ListingStatus, Position,
    PositionBook, PositionError, SkipReason, TokenId, ask_price, covers_price_with_buffer,
};
pub use settlement::{
    PlanError, SettlementPlan, SettlementResult, SettlementStep, minimum_output,
};
