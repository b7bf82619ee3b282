//! Swap Venue Port - DEX Interaction Interface
//!
//! Defines the trait for the wrapped-native to reward-token swap leg of
//! settlement: read-only quoting plus the three transactions (wrap,
//! approve, swap) as separately confirmed steps.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::chain_client::CallOutcome;

/// Trait for the on-chain swap venue (a V2-style router).
///
/// The token pair (wrapped-native in, reward token out) is fixed by the
/// adapter's configuration; amounts are native/token whole units.
#[async_trait]
pub trait SwapVenue: Send + Sync + 'static {
  /// Read-only quote: reward tokens out for `amount_in` wrapped native.
  ///
  /// Taken immediately before the swap; the caller derives the
  /// minimum-output floor from it.
  async fn quote_native_for_reward(&self, amount_in: Decimal) -> anyhow::Result<Decimal>;

  /// Wrap native currency into the wrapped-native token.
  async fn wrap_native(&self, amount: Decimal) -> anyhow::Result<CallOutcome>;

  /// Approve the router to spend the wrapped tranche.
  async fn approve_router(&self, amount: Decimal) -> anyhow::Result<CallOutcome>;

  /// Swap wrapped native for the reward token, enforcing `min_out`.
  ///
  /// The router reverts the whole transaction when the achievable output
  /// falls below `min_out`; a revert surfaces as `success == false`.
  async fn swap_wrapped_for_reward(
    &self,
    amount_in: Decimal,
    min_out: Decimal,
  ) -> anyhow::Result<CallOutcome>;

  /// Check if the venue (router reachability) is healthy.
  async fn is_healthy(&self) -> bool;
}
