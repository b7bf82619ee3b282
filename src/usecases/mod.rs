//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the bot's core workflows. Each use case is a self-contained
//! business operation.
//!
//! Use cases:
//! - `FlywheelEngine`: Buy underpriced listings, verify, relist, watch
//! - `TreasurySettler`: Balance-triggered swap-and-burn settlement
//! - `LockManager`: Named TTL locks with fail-open acquisition
//! - `DailySpendGuard`: UTC-day native spend cap

pub mod flywheel;
pub mod lock_manager;
pub mod spend_guard;
pub mod treasury;
