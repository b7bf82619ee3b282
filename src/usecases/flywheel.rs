//! Flywheel Engine - Acquisition and Relisting Loop
//!
//! The main use case: pull a candidate listing, check affordability and
//! the daily cap, execute the prebuilt fulfillment call, verify on-chain
//! ownership, relist at a markup, then poll for sale evidence within a
//! bounded watch window.
//!
//! One cycle handles one item, driven through explicit states:
//! Idle -> Evaluating -> Buying -> VerifyingOwnership -> Listing ->
//! Watching -> (Sold | TimedOut). The loop itself never exits on error;
//! an unhandled failure logs, sleeps and resumes from Idle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::events::{AccountKind, FlywheelEvent};
use crate::domain::failure::FailureKind;
use crate::domain::flywheel::{
  CycleOutcome, Listing, Position, PositionBook, SkipReason, ask_price,
  covers_price_with_buffer,
};
use crate::ports::chain_client::ChainClient;
use crate::ports::marketplace::Marketplace;

use super::spend_guard::DailySpendGuard;

/// Flywheel engine orchestrating the buy-relist-watch loop.
pub struct FlywheelEngine<M: Marketplace, C: ChainClient> {
  /// Marketplace gateway (listing source + ask management).
  market: Arc<M>,
  /// Chain client signing for the trading account.
  chain: Arc<C>,
  /// Daily spend cap, owned here and mutated nowhere else.
  spend_guard: DailySpendGuard,
  /// Open positions, unique per token.
  positions: PositionBook,
  /// Bot configuration.
  config: AppConfig,
  /// Event bus towards the recorder and the settler.
  events: broadcast::Sender<FlywheelEvent>,
  /// Shutdown signal receiver.
  shutdown_rx: broadcast::Receiver<()>,
}

impl<M: Marketplace, C: ChainClient> FlywheelEngine<M, C> {
  /// Create a new flywheel engine.
  pub fn new(
    market: Arc<M>,
    chain: Arc<C>,
    config: AppConfig,
    events: broadcast::Sender<FlywheelEvent>,
    shutdown_rx: broadcast::Receiver<()>,
  ) -> Self {
    let spend_guard = DailySpendGuard::new(config.risk.daily_spend_cap);

    Self {
      market,
      chain,
      spend_guard,
      positions: PositionBook::new(),
      config,
      events,
      shutdown_rx,
    }
  }

  /// Open positions (for tests and diagnostics).
  pub fn positions(&self) -> &PositionBook {
    &self.positions
  }

  /// Spend recorded in the current UTC day.
  pub fn spent_today(&self) -> rust_decimal::Decimal {
    self.spend_guard.spent_today()
  }

  /// Run the acquisition loop until shutdown.
  ///
  /// A shutdown signal cancels the in-flight cycle at its next await
  /// point; engine-local state is disposable across restarts.
  #[instrument(skip(self), name = "flywheel_loop")]
  pub async fn run(&mut self) -> Result<()> {
    info!(
      collection = %self.config.marketplace.collection,
      markup = %self.config.flywheel.markup_fraction,
      daily_cap = %self.config.risk.daily_spend_cap,
      dry_run = self.config.bot.dry_run,
      "Starting flywheel engine"
    );

    let mut shutdown_rx = self.shutdown_rx.resubscribe();

    loop {
      tokio::select! {
        _ = shutdown_rx.recv() => {
          info!("Shutdown signal received, stopping flywheel engine");
          break;
        }
        () = self.cycle_with_recovery() => {}
      }
    }

    Ok(())
  }

  /// One cycle plus the never-exit error policy around it.
  ///
  /// All backoff sleeps live in here so the shutdown arm of `run` can
  /// cancel them.
  async fn cycle_with_recovery(&mut self) {
    match self.run_cycle().await {
      Ok(CycleOutcome::Idle) => {
        debug!("No candidate listing available");
        tokio::time::sleep(Duration::from_secs(self.config.flywheel.idle_backoff_seconds)).await;
      }
      Ok(_) => {}
      Err(e) => {
        warn!(error = %e, "Flywheel cycle failed, backing off before resuming");
        let _ = self.events.send(FlywheelEvent::CycleFailed {
          kind: FailureKind::Unexpected,
        });
        tokio::time::sleep(Duration::from_secs(self.config.flywheel.error_backoff_seconds)).await;
      }
    }
  }

  /// Drive a single item through the full state machine.
  ///
  /// Public so tests can step the engine one cycle at a time.
  #[instrument(skip(self), name = "flywheel_cycle")]
  pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
    // Evaluating: is there a candidate, and can we afford it?
    let Some(listing) = self.market.next_listing().await? else {
      return Ok(CycleOutcome::Idle);
    };

    info!(
      token = %listing.token_id,
      listing = %listing.id,
      price = %listing.price,
      "Evaluating candidate listing"
    );

    let balance = self.chain.native_balance(self.chain.address()).await?;
    let _ = self.events.send(FlywheelEvent::BalanceObserved {
      account: AccountKind::Trading,
      balance,
    });

    if !covers_price_with_buffer(
      balance,
      listing.price,
      self.config.flywheel.buy_buffer_fraction,
    ) {
      info!(
        balance = %balance,
        price = %listing.price,
        buffer = %self.config.flywheel.buy_buffer_fraction,
        "Balance does not cover price plus buffer, skipping"
      );
      return Ok(self.skip(&listing, SkipReason::InsufficientBalance));
    }

    if !self.spend_guard.can_spend(listing.price) {
      info!(
        price = %listing.price,
        spent_today = %self.spend_guard.spent_today(),
        "Daily spend cap reached, skipping"
      );
      return Ok(self.skip(&listing, SkipReason::DailyCapReached));
    }

    if self.config.bot.dry_run {
      info!(
        token = %listing.token_id,
        price = %listing.price,
        "Dry-run: would execute fulfillment call"
      );
      return Ok(self.skip(&listing, SkipReason::DryRun));
    }

    // Buying: execute the prebuilt fulfillment call verbatim.
    let token_id = listing.token_id.clone();
    let outcome = match self.chain.submit_fulfillment(&listing.call).await {
      Ok(outcome) => outcome,
      Err(e) => {
        warn!(token = %token_id, error = %e, "Purchase submission failed, skipping item");
        let _ = self.events.send(FlywheelEvent::BuyFailed {
          token_id: token_id.clone(),
        });
        return Ok(CycleOutcome::BuyFailed { token_id });
      }
    };

    if !outcome.success {
      warn!(
        token = %token_id,
        tx = %outcome.tx_hash,
        "Purchase transaction reverted, skipping item"
      );
      let _ = self.events.send(FlywheelEvent::BuyFailed {
        token_id: token_id.clone(),
      });
      return Ok(CycleOutcome::BuyFailed { token_id });
    }

    // Payment confirmed: count it against the cap now. The counter is
    // not rolled back if verification below fails; the money is gone.
    self.spend_guard.record_spend(listing.price);
    let _ = self.events.send(FlywheelEvent::BuyRecorded {
      token_id: token_id.clone(),
      cost: listing.price,
    });
    let _ = self.events.send(FlywheelEvent::SpendRecorded {
      day_total: self.spend_guard.spent_today(),
    });
    info!(
      token = %token_id,
      tx = %outcome.tx_hash,
      cost = %listing.price,
      gas = %outcome.gas_cost,
      "Purchase confirmed"
    );

    // VerifyingOwnership: no position until the chain agrees we own it.
    let verified = match self
      .chain
      .nft_owner(&self.config.marketplace.collection, &token_id)
      .await
    {
      Ok(owner) => owner.eq_ignore_ascii_case(self.chain.address()),
      Err(e) => {
        warn!(token = %token_id, error = %e, "Ownership read failed after retries");
        false
      }
    };

    if !verified {
      error!(
        token = %token_id,
        tx = %outcome.tx_hash,
        "Paid but ownership not confirmed on-chain; no position created"
      );
      let _ = self.events.send(FlywheelEvent::OwnershipFailed {
        token_id: token_id.clone(),
      });
      return Ok(CycleOutcome::OwnershipFailed { token_id });
    }

    // Listing: relist at cost plus markup.
    let ask = ask_price(listing.price, self.config.flywheel.markup_fraction);
    self
      .positions
      .open(Position::acquired(token_id.clone(), listing.price))
      .context("position bookkeeping rejected the token")?;

    let ask_listing_id = match self.market.create_listing(&token_id, ask).await {
      Ok(id) => id,
      Err(e) => {
        // We own the item but could not relist it. Drop the position
        // record and surface the error; the item sits in the wallet
        // for the operator.
        self.positions.close(&token_id);
        return Err(e).with_context(|| format!("failed to relist token {token_id}"));
      }
    };

    if let Some(position) = self.positions.close(&token_id) {
      self
        .positions
        .update(position.listed(ask_listing_id.clone(), ask));
    }

    let _ = self.events.send(FlywheelEvent::Relisted {
      token_id: token_id.clone(),
      ask,
    });
    info!(
      token = %token_id,
      ask = %ask,
      listing = %ask_listing_id,
      "Relisted at markup"
    );

    // Watching: bounded poll for sale evidence. Poll failures consume
    // attempts too; the window is bounded in attempts, not wall time.
    self.watch_for_sale(&token_id, &ask_listing_id, ask).await
  }

  async fn watch_for_sale(
    &mut self,
    token_id: &str,
    ask_listing_id: &crate::domain::flywheel::ListingId,
    ask: rust_decimal::Decimal,
  ) -> Result<CycleOutcome> {
    use crate::domain::flywheel::ListingStatus;

    let max_polls = self.config.flywheel.watch_max_polls;
    let poll_interval = Duration::from_secs(self.config.flywheel.watch_poll_seconds);

    for attempt in 1..=max_polls {
      tokio::time::sleep(poll_interval).await;

      match self.market.listing_status(ask_listing_id).await {
        Ok(ListingStatus::Filled) => {
          self.positions.close(token_id);
          info!(token = %token_id, proceeds = %ask, attempt, "Sale detected");
          let _ = self.events.send(FlywheelEvent::SaleDetected {
            token_id: token_id.to_string(),
            proceeds: ask,
          });
          return Ok(CycleOutcome::Sold {
            token_id: token_id.to_string(),
            proceeds: ask,
          });
        }
        Ok(ListingStatus::Cancelled) => {
          self.positions.close(token_id);
          warn!(token = %token_id, "Ask cancelled out from under us, abandoning position");
          let _ = self.events.send(FlywheelEvent::Delisted {
            token_id: token_id.to_string(),
          });
          return Ok(CycleOutcome::Delisted {
            token_id: token_id.to_string(),
          });
        }
        Ok(ListingStatus::Active | ListingStatus::Unknown) => {
          debug!(token = %token_id, attempt, max_polls, "Ask still open");
        }
        Err(e) => {
          warn!(token = %token_id, attempt, error = %e, "Sale poll failed");
        }
      }
    }

    // Watch window exhausted: the marketplace keeps the ask live, we
    // just stop looking. The position is abandoned, not the listing.
    self.positions.close(token_id);
    warn!(
      token = %token_id,
      polls = max_polls,
      "Watch window exhausted; abandoning position, item stays listed"
    );
    let _ = self.events.send(FlywheelEvent::WatchTimedOut {
      token_id: token_id.to_string(),
    });
    Ok(CycleOutcome::TimedOut {
      token_id: token_id.to_string(),
    })
  }

  fn skip(&self, listing: &Listing, reason: SkipReason) -> CycleOutcome {
    let _ = self.events.send(FlywheelEvent::ListingSkipped {
      token_id: listing.token_id.clone(),
      reason,
    });
    CycleOutcome::Skipped {
      token_id: listing.token_id.clone(),
      reason,
    }
  }
}
