//! Chain Client Port - On-chain Interaction Interface
//!
//! Defines the trait for interacting with the chain on behalf of one
//! signing account: balance reads, ERC-721 ownership checks, raw
//! fulfillment submission and plain transfers. Uses alloy-rs.
//!
//! Amounts cross this boundary as `Decimal` in whole-token units; wei
//! conversion is the adapter's business.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::flywheel::{FulfillmentCall, TokenId};

/// Outcome of a confirmed transaction.
#[derive(Debug, Clone)]
pub struct CallOutcome {
  /// Transaction hash.
  pub tx_hash: String,
  /// Whether the receipt reported success.
  pub success: bool,
  /// Block the transaction landed in.
  pub block_number: u64,
  /// Gas actually paid, in native units.
  pub gas_cost: Decimal,
}

/// Trait for on-chain interactions via alloy-rs.
///
/// One instance per signing account; `address` identifies which.
/// Every submitting method waits for the receipt before returning, so
/// callers can sequence irreversible steps on confirmation.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
  /// The 0x-prefixed address this client signs for.
  fn address(&self) -> &str;

  /// Native balance of an arbitrary address.
  async fn native_balance(&self, address: &str) -> anyhow::Result<Decimal>;

  /// ERC-20 balance of `owner` for `token`, in whole-token units.
  async fn erc20_balance(&self, token: &str, owner: &str) -> anyhow::Result<Decimal>;

  /// Current ERC-721 owner of `token_id` in `collection`.
  async fn nft_owner(&self, collection: &str, token_id: &TokenId) -> anyhow::Result<String>;

  /// Submit a prebuilt fulfillment call verbatim and wait for its receipt.
  ///
  /// # Errors
  /// Returns an error when submission itself fails; a mined-but-reverted
  /// transaction comes back as `Ok` with `success == false`.
  async fn submit_fulfillment(&self, call: &FulfillmentCall) -> anyhow::Result<CallOutcome>;

  /// Transfer native currency and wait for the receipt.
  async fn transfer_native(&self, to: &str, amount: Decimal) -> anyhow::Result<CallOutcome>;

  /// Transfer ERC-20 tokens and wait for the receipt.
  async fn transfer_erc20(
    &self,
    token: &str,
    to: &str,
    amount: Decimal,
  ) -> anyhow::Result<CallOutcome>;

  /// Current gas price, for observability gauges.
  async fn gas_price_gwei(&self) -> anyhow::Result<f64>;

  /// Check if the chain client connection is healthy.
  async fn is_healthy(&self) -> bool;
}
