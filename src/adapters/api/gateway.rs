//! Marketplace Gateway — Adapter for the Marketplace Port
//!
//! Implements the `Marketplace` port using the shared `GatewayClient`
//! for authenticated requests: candidate listing discovery, relisting,
//! and listing status polls. Malformed listings are skipped with a
//! warning instead of failing the cycle; discovery follows the page
//! cursor over a bounded number of pages before giving up.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use super::client::GatewayClient;
use super::types::{
    CreateListingRequest, CreateListingResponse, ListingDto, ListingStatusResponse,
    ListingsResponse,
};
use crate::domain::flywheel::{FulfillmentCall, Listing, ListingId, ListingStatus, TokenId};
use crate::ports::marketplace::Marketplace;

/// Listings fetched per discovery page.
const DISCOVERY_PAGE_SIZE: usize = 20;

/// Bound on cursor-following when a page holds only malformed listings.
const DISCOVERY_MAX_PAGES: usize = 5;

/// Build the listings query path, threading the pagination cursor.
fn listings_path(collection: &str, cursor: Option<&str>) -> String {
    let base = format!(
        "/listings?collection={collection}&status=active&limit={DISCOVERY_PAGE_SIZE}"
    );
    match cursor {
        Some(cursor) => format!("{base}&cursor={cursor}"),
        None => base,
    }
}

/// Marketplace gateway backed by the shared authenticated client.
///
/// Uses `GatewayClient` for all HTTP requests (inherits HMAC auth,
/// retry logic, and rate limiting). Never creates its own reqwest
/// client.
pub struct MarketGateway {
    /// Shared gateway client with auth + retry.
    client: Arc<GatewayClient>,
    /// Collection contract this bot trades, 0x-prefixed.
    collection: String,
}

impl MarketGateway {
    pub fn new(client: Arc<GatewayClient>, collection: String) -> Self {
        Self { client, collection }
    }
}

/// Map a wire listing into the domain, rejecting unparseable amounts.
fn to_domain(dto: ListingDto) -> Result<Listing> {
    let price: Decimal = dto
        .price
        .parse()
        .with_context(|| format!("unparseable price {:?}", dto.price))?;
    anyhow::ensure!(price > Decimal::ZERO, "non-positive price {price}");

    let value: Decimal = dto
        .fulfillment
        .value
        .parse()
        .with_context(|| format!("unparseable fulfillment value {:?}", dto.fulfillment.value))?;
    anyhow::ensure!(value >= Decimal::ZERO, "negative fulfillment value {value}");

    Ok(Listing {
        id: dto.id,
        token_id: dto.token_id,
        price,
        call: FulfillmentCall {
            to: dto.fulfillment.to,
            data: dto.fulfillment.data,
            value,
        },
    })
}

/// Map a gateway status string onto the domain status.
fn to_status(status: &str) -> ListingStatus {
    match status.to_ascii_lowercase().as_str() {
        "active" | "open" => ListingStatus::Active,
        "filled" | "sold" => ListingStatus::Filled,
        "cancelled" | "canceled" => ListingStatus::Cancelled,
        other => {
            debug!(status = other, "Unrecognized listing status");
            ListingStatus::Unknown
        }
    }
}

#[async_trait]
impl Marketplace for MarketGateway {
    #[instrument(skip(self))]
    async fn next_listing(&self) -> Result<Option<Listing>> {
        let mut cursor: Option<String> = None;

        for _ in 0..DISCOVERY_MAX_PAGES {
            let path = listings_path(&self.collection, cursor.as_deref());
            let response = self
                .client
                .get(&path)
                .await
                .context("Failed to fetch listings")?;
            let page: ListingsResponse = response
                .json()
                .await
                .context("Failed to parse listings response")?;

            if let Some(info) = self.client.rate_limit_status().await {
                if info.remaining < info.limit / 10 {
                    warn!(
                        remaining = info.remaining,
                        limit = info.limit,
                        "Gateway quota nearly exhausted"
                    );
                }
            }

            for dto in page.listings {
                let id = dto.id.clone();
                match to_domain(dto) {
                    Ok(listing) => return Ok(Some(listing)),
                    Err(e) => {
                        warn!(listing = %id, error = %e, "Skipping malformed listing");
                    }
                }
            }

            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(None)
    }

    #[instrument(skip(self), fields(token = %token_id, ask = %ask))]
    async fn create_listing(&self, token_id: &TokenId, ask: Decimal) -> Result<ListingId> {
        let request = CreateListingRequest {
            token_id: token_id.clone(),
            price: ask.to_string(),
        };
        let body =
            serde_json::to_string(&request).context("Failed to serialize listing request")?;

        let response = self
            .client
            .post("/listings", &body)
            .await
            .context("Failed to create listing")?;
        let created: CreateListingResponse = response
            .json()
            .await
            .context("Failed to parse create listing response")?;

        if !created.success {
            bail!(
                "Gateway rejected listing: {}",
                created
                    .error_msg
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }

        created
            .listing_id
            .context("Gateway accepted listing but returned no id")
    }

    #[instrument(skip(self), fields(listing = %listing_id))]
    async fn listing_status(&self, listing_id: &ListingId) -> Result<ListingStatus> {
        let path = format!("/listings/{listing_id}");
        let response = self
            .client
            .get(&path)
            .await
            .context("Failed to fetch listing status")?;
        let status: ListingStatusResponse = response
            .json()
            .await
            .context("Failed to parse listing status response")?;

        Ok(to_status(&status.status))
    }

    async fn is_healthy(&self) -> bool {
        self.client.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::FulfillmentDto;
    use rust_decimal_macros::dec;

    fn dto(price: &str, value: &str) -> ListingDto {
        ListingDto {
            id: "lst-1".to_string(),
            token_id: "4217".to_string(),
            price: price.to_string(),
            fulfillment: FulfillmentDto {
                to: "0x00000000000000000000000000000000000000aa".to_string(),
                data: "0xdeadbeef".to_string(),
                value: value.to_string(),
            },
        }
    }

    #[test]
    fn test_to_domain_parses_amounts() {
        let listing = to_domain(dto("2.5", "2.5")).unwrap();
        assert_eq!(listing.price, dec!(2.5));
        assert_eq!(listing.call.value, dec!(2.5));
        assert_eq!(listing.token_id, "4217");
    }

    #[test]
    fn test_to_domain_rejects_non_positive_price() {
        assert!(to_domain(dto("0", "0")).is_err());
        assert!(to_domain(dto("-1", "0")).is_err());
    }

    #[test]
    fn test_to_domain_rejects_garbage() {
        assert!(to_domain(dto("not-a-number", "0")).is_err());
        assert!(to_domain(dto("2.5", "??")).is_err());
    }

    #[test]
    fn test_listings_path_threads_cursor() {
        let first = listings_path("0xabc", None);
        assert_eq!(first, "/listings?collection=0xabc&status=active&limit=20");
        let next = listings_path("0xabc", Some("pg2"));
        assert_eq!(
            next,
            "/listings?collection=0xabc&status=active&limit=20&cursor=pg2"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(to_status("active"), ListingStatus::Active);
        assert_eq!(to_status("FILLED"), ListingStatus::Filled);
        assert_eq!(to_status("Sold"), ListingStatus::Filled);
        assert_eq!(to_status("cancelled"), ListingStatus::Cancelled);
        assert_eq!(to_status("canceled"), ListingStatus::Cancelled);
        assert_eq!(to_status("on-hold"), ListingStatus::Unknown);
    }
}
