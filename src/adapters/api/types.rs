//! Marketplace Gateway Request/Response Types
//!
//! Defines the serialization types for communicating with the
//! marketplace gateway REST API. All types derive Serialize/Deserialize
//! for JSON transport. Amounts travel as strings and are parsed into
//! `Decimal` at the mapping layer.

use serde::{Deserialize, Serialize};

/// A prebuilt fulfillment call attached to a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentDto {
  /// Contract to call.
  pub to: String,
  /// Hex calldata, 0x-prefixed.
  pub data: String,
  /// Native value to attach, in whole units.
  pub value: String,
}

/// One listing as returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingDto {
  /// Gateway listing ID.
  pub id: String,
  /// ERC-721 token ID, decimal string.
  pub token_id: String,
  /// Asking price in native units.
  pub price: String,
  /// Prebuilt call that buys this listing.
  pub fulfillment: FulfillmentDto,
}

/// Response for a listings page query.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingsResponse {
  /// Candidate listings, cheapest first.
  pub listings: Vec<ListingDto>,
  /// Pagination cursor, when more pages exist.
  pub cursor: Option<String>,
}

/// Request payload to create a listing.
#[derive(Debug, Clone, Serialize)]
pub struct CreateListingRequest {
  /// Token to list.
  pub token_id: String,
  /// Asking price in native units.
  pub price: String,
}

/// Response from listing creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListingResponse {
  /// Whether the listing was accepted.
  pub success: bool,
  /// Assigned listing ID.
  pub listing_id: Option<String>,
  /// Error message if rejected.
  pub error_msg: Option<String>,
}

/// Response for a single listing status query.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingStatusResponse {
  /// Listing ID queried.
  pub id: String,
  /// Status string: "active", "filled", "cancelled".
  pub status: String,
}

/// Rate limit info from response headers.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
  /// Requests remaining in the current window.
  pub remaining: u32,
  /// Window reset time (epoch ms).
  pub reset_ms: u64,
  /// Total requests allowed per window.
  pub limit: u32,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
  /// Error message.
  pub error: String,
}
