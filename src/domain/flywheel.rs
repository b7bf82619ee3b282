//! Core flywheel domain types.
//!
//! Defines the entities the acquisition loop moves between: marketplace
//! listings, prebuilt fulfillment calls, and the positions the bot holds
//! while an item is relisted. Also hosts the two pure pricing rules
//! (affordability buffer, relist markup) so they stay testable in isolation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────
// Type aliases consumed by ports and adapters
// ────────────────────────────────────────────

/// NFT token identifier as a decimal string (ERC-721 ids are uint256,
/// so they stay strings everywhere outside the chain adapter).
pub type TokenId = String;

/// Marketplace listing identifier used at the ports boundary.
pub type ListingId = String;

// ────────────────────────────────────────────
// Marketplace-facing entities
// ────────────────────────────────────────────

/// A prebuilt marketplace fulfillment call, executed verbatim.
///
/// The gateway returns the exact transaction the marketplace expects:
/// target contract, ABI-encoded calldata, and the native value to attach.
/// The bot never builds or modifies purchase calldata itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentCall {
    /// Target contract address (0x-prefixed hex).
    pub to: String,
    /// ABI-encoded calldata (0x-prefixed hex).
    pub data: String,
    /// Native value to attach, in whole-coin units.
    pub value: Decimal,
}

/// A candidate listing pulled from the listing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Marketplace listing identifier.
    pub id: ListingId,
    /// Token offered for sale.
    pub token_id: TokenId,
    /// Asking price in native units.
    pub price: Decimal,
    /// Prebuilt call that purchases this listing.
    pub call: FulfillmentCall,
}

/// Lifecycle status of one of our own ask listings, as reported
/// by the marketplace poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    /// Still resting on the marketplace.
    Active,
    /// Sold; proceeds are on their way to the treasury.
    Filled,
    /// Cancelled or expired out from under us.
    Cancelled,
    /// Marketplace returned something unrecognized.
    Unknown,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ────────────────────────────────────────────
// Positions
// ────────────────────────────────────────────

/// An item the bot bought and is holding or has relisted.
///
/// A position exists only after on-chain ownership is verified; a paid
/// purchase whose ownership check fails never becomes a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Token held.
    pub token_id: TokenId,
    /// What we paid, in native units.
    pub cost: Decimal,
    /// Price we relisted at (cost plus markup), once listed.
    pub ask_price: Option<Decimal>,
    /// Our own ask listing id, once listed.
    pub listing_id: Option<ListingId>,
    /// When the purchase was confirmed.
    pub acquired_at: DateTime<Utc>,
    /// When the relist was accepted by the marketplace.
    pub listed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Creates a freshly-acquired, not-yet-listed position.
    pub fn acquired(token_id: TokenId, cost: Decimal) -> Self {
        Self {
            token_id,
            cost,
            ask_price: None,
            listing_id: None,
            acquired_at: Utc::now(),
            listed_at: None,
        }
    }

    /// Marks the position as relisted at the given ask.
    pub fn listed(mut self, listing_id: ListingId, ask: Decimal) -> Self {
        self.ask_price = Some(ask);
        self.listing_id = Some(listing_id);
        self.listed_at = Some(Utc::now());
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("position already open for token {0}")]
    AlreadyOpen(TokenId),
}

/// Owned book of open positions, unique per token id.
///
/// Owned by the flywheel engine alone; nothing else mutates it.
#[derive(Debug, Default)]
pub struct PositionBook {
    inner: HashMap<TokenId, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a position. Rejects a second position for the same token.
    pub fn open(&mut self, position: Position) -> Result<(), PositionError> {
        if self.inner.contains_key(&position.token_id) {
            return Err(PositionError::AlreadyOpen(position.token_id));
        }
        self.inner.insert(position.token_id.clone(), position);
        Ok(())
    }

    /// Closes and returns the position for a token, if open.
    pub fn close(&mut self, token_id: &str) -> Option<Position> {
        self.inner.remove(token_id)
    }

    /// Replaces an open position with an updated copy (same token id).
    pub fn update(&mut self, position: Position) {
        self.inner.insert(position.token_id.clone(), position);
    }

    pub fn get(&self, token_id: &str) -> Option<&Position> {
        self.inner.get(token_id)
    }

    pub fn contains(&self, token_id: &str) -> bool {
        self.inner.contains_key(token_id)
    }

    pub fn open_count(&self) -> usize {
        self.inner.len()
    }
}

// ────────────────────────────────────────────
// Pricing rules
// ────────────────────────────────────────────

/// Relist ask: `cost * (1 + markup)`.
pub fn ask_price(cost: Decimal, markup: Decimal) -> Decimal {
    (cost * (Decimal::ONE + markup)).normalize()
}

/// Affordability gate: the available balance must cover the price plus
/// a proportional buffer for gas, `available >= price * (1 + buffer)`.
pub fn covers_price_with_buffer(available: Decimal, price: Decimal, buffer: Decimal) -> bool {
    available >= price * (Decimal::ONE + buffer)
}

// ────────────────────────────────────────────
// Cycle outcomes
// ────────────────────────────────────────────

/// Why a candidate listing was rejected before any money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Balance below price plus buffer.
    InsufficientBalance,
    /// Daily spend cap would be exceeded.
    DailyCapReached,
    /// Dry-run mode: decision made, submission skipped.
    DryRun,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientBalance => write!(f, "insufficient_balance"),
            Self::DailyCapReached => write!(f, "daily_cap_reached"),
            Self::DryRun => write!(f, "dry_run"),
        }
    }
}

/// Terminal result of one flywheel cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// No candidate listing was available.
    Idle,
    /// A candidate was seen but rejected before buying.
    Skipped { token_id: TokenId, reason: SkipReason },
    /// The purchase transaction failed or reverted. Nothing was acquired.
    BuyFailed { token_id: TokenId },
    /// Payment went through but ownership never verified on-chain.
    /// Spend stays counted; no position exists.
    OwnershipFailed { token_id: TokenId },
    /// The ask filled within the watch window.
    Sold { token_id: TokenId, proceeds: Decimal },
    /// The watch window elapsed. The item stays listed; the position
    /// is abandoned.
    TimedOut { token_id: TokenId },
    /// Our ask was cancelled or expired before it could fill.
    Delisted { token_id: TokenId },
}
