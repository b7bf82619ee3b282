//! Marketplace Port - Listing Source and Ask Management Interface
//!
//! Defines the trait for the external marketplace gateway: pulling
//! candidate listings (with their prebuilt fulfillment calls), posting
//! our own asks, and polling ask status for sale evidence.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::flywheel::{Listing, ListingId, ListingStatus, TokenId};

/// Trait for the marketplace gateway.
///
/// The gateway owns candidate selection: `next_listing` returns the
/// single listing the bot should consider next, already carrying the
/// exact fulfillment call. The bot never builds purchase calldata.
#[async_trait]
pub trait Marketplace: Send + Sync + 'static {
  /// Fetch the next candidate listing, if any is currently attractive.
  async fn next_listing(&self) -> anyhow::Result<Option<Listing>>;

  /// Post an ask for a token we own at the given native price.
  ///
  /// Returns the marketplace id of our listing, used for status polling.
  async fn create_listing(&self, token_id: &TokenId, ask: Decimal) -> anyhow::Result<ListingId>;

  /// Poll the current status of one of our own asks.
  async fn listing_status(&self, listing_id: &ListingId) -> anyhow::Result<ListingStatus>;

  /// Check if the marketplace connection is healthy.
  async fn is_healthy(&self) -> bool;
}
