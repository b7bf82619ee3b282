//! Treasury Settler - Balance-Triggered Swap-and-Burn Pipeline
//!
//! Polls the treasury's native balance on a timer (never on sale events;
//! a detected sale merely advances the next poll) and, once the balance
//! clears the configured threshold, runs the settlement pipeline under
//! the `treasury-burn` lock:
//!
//! 1. Partition: fixed gas reserve, then 99% swap tranche / 1% top-up
//! 2. Read-only router quote, minimum output under slippage tolerance
//! 3. Wrap native
//! 4. Approve router
//! 5. Swap with the minimum-output floor
//! 6. Re-read reward balance (zero means a degraded run, burn skipped)
//! 7. Transfer the full reward balance to the burn address
//! 8. Transfer the top-up to the trading account
//! 9. Journal the result
//!
//! Each step waits for its transaction to confirm before the next
//! starts, and checkpoints a high-water mark. A failed step aborts the
//! remainder, releases the lock and surfaces the error; there is no
//! rollback, and the next poll retries the whole settlement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::events::{AccountKind, FlywheelEvent, SettlementSkip};
use crate::domain::failure::FailureKind;
use crate::domain::settlement::{
  SettlementPlan, SettlementResult, SettlementStep, minimum_output,
};
use crate::ports::archive::SettlementArchive;
use crate::ports::chain_client::{CallOutcome, ChainClient};
use crate::ports::swap_venue::SwapVenue;

use super::lock_manager::LockManager;

/// Name of the lock that serializes settlement runs across instances.
pub const TREASURY_BURN_LOCK: &str = "treasury-burn";

/// A pipeline step that failed, with its taxonomy class.
struct StepFailure {
  step: SettlementStep,
  kind: FailureKind,
  source: anyhow::Error,
}

impl StepFailure {
  fn new(step: SettlementStep, kind: FailureKind, source: anyhow::Error) -> Self {
    Self { step, kind, source }
  }
}

/// Treasury settler owning the swap-and-burn pipeline.
pub struct TreasurySettler<C: ChainClient, V: SwapVenue, A: SettlementArchive> {
  /// Chain client signing for the treasury account.
  chain: Arc<C>,
  /// DEX venue for the wrap/approve/swap legs.
  venue: Arc<V>,
  /// Journal and checkpoint persistence.
  archive: Arc<A>,
  /// Named TTL locks (fail-open).
  locks: LockManager,
  /// Bot configuration.
  config: AppConfig,
  /// Trading account that receives the 1% gas top-up.
  trading_address: String,
  /// Event bus: publishes settlement telemetry, subscribes for sale nudges.
  events: broadcast::Sender<FlywheelEvent>,
  /// Shutdown signal receiver.
  shutdown_rx: broadcast::Receiver<()>,
}

impl<C: ChainClient, V: SwapVenue, A: SettlementArchive> TreasurySettler<C, V, A> {
  /// Create a new treasury settler.
  pub fn new(
    chain: Arc<C>,
    venue: Arc<V>,
    archive: Arc<A>,
    locks: LockManager,
    config: AppConfig,
    trading_address: String,
    events: broadcast::Sender<FlywheelEvent>,
    shutdown_rx: broadcast::Receiver<()>,
  ) -> Self {
    Self {
      chain,
      venue,
      archive,
      locks,
      config,
      trading_address,
      events,
      shutdown_rx,
    }
  }

  /// Run the settlement poll loop until shutdown.
  #[instrument(skip(self), name = "treasury_loop")]
  pub async fn run(&mut self) -> Result<()> {
    info!(
      poll_secs = self.config.treasury.poll_seconds,
      min_balance = %self.config.treasury.min_settle_balance,
      gas_reserve = %self.config.treasury.gas_reserve,
      burn_address = %self.config.treasury.burn_address,
      "Starting treasury settler"
    );

    self.report_interrupted_run().await;

    let mut ticker =
      tokio::time::interval(Duration::from_secs(self.config.treasury.poll_seconds));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut shutdown_rx = self.shutdown_rx.resubscribe();
    let mut bus_rx = self.events.subscribe();
    let mut bus_open = true;

    loop {
      tokio::select! {
        _ = shutdown_rx.recv() => {
          info!("Shutdown signal received, stopping treasury settler");
          break;
        }
        _ = ticker.tick() => {
          self.tick().await;
        }
        event = bus_rx.recv(), if bus_open => {
          match event {
            Ok(FlywheelEvent::SaleDetected { token_id, .. }) => {
              debug!(token = %token_id, "Sale detected, advancing settlement poll");
              self.tick().await;
              ticker.reset();
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
              warn!(skipped, "Settler lagged behind the event bus");
            }
            Err(broadcast::error::RecvError::Closed) => {
              bus_open = false;
            }
          }
        }
      }
    }

    Ok(())
  }

  /// One poll: run the balance check and, when warranted, the pipeline.
  async fn tick(&mut self) {
    match self.settle_once().await {
      Ok(Some(result)) => {
        info!(
          run = %result.run_id,
          burned = %result.reward_burned,
          topup = %result.gas_topup,
          degraded = result.degraded,
          "Settlement run finished"
        );
      }
      Ok(None) => {}
      Err(e) => {
        error!(error = %e, "Settlement run failed; next poll will retry from scratch");
      }
    }
  }

  /// Balance check, lock scope and pipeline for a single run.
  ///
  /// `Ok(None)` means the tick ended without a pipeline run (below
  /// threshold, lock busy, or dry-run). Public so tests can drive single
  /// runs against mocked ports.
  #[instrument(skip(self), name = "settlement_run")]
  pub async fn settle_once(&mut self) -> Result<Option<SettlementResult>> {
    let run_id = Uuid::new_v4();
    let started = Instant::now();

    let balance = match self.chain.native_balance(self.chain.address()).await {
      Ok(balance) => balance,
      Err(e) => {
        let _ = self.events.send(FlywheelEvent::SettlementFailed {
          run_id,
          step: SettlementStep::Planned,
          kind: FailureKind::Transient,
        });
        return Err(e).context("failed to read treasury balance");
      }
    };
    let _ = self.events.send(FlywheelEvent::BalanceObserved {
      account: AccountKind::Treasury,
      balance,
    });

    if balance < self.config.treasury.min_settle_balance {
      debug!(
        balance = %balance,
        threshold = %self.config.treasury.min_settle_balance,
        "Treasury balance below settle threshold"
      );
      let _ = self.events.send(FlywheelEvent::SettlementSkipped {
        reason: SettlementSkip::BelowThreshold,
      });
      return Ok(None);
    }

    if self.config.bot.dry_run {
      self.log_dry_run(balance).await;
      let _ = self.events.send(FlywheelEvent::SettlementSkipped {
        reason: SettlementSkip::DryRun,
      });
      return Ok(None);
    }

    if !self.locks.acquire(TREASURY_BURN_LOCK).await {
      info!("Settlement lock held elsewhere, skipping run");
      let _ = self.events.send(FlywheelEvent::SettlementSkipped {
        reason: SettlementSkip::LockBusy,
      });
      return Ok(None);
    }

    let _ = self.events.send(FlywheelEvent::SettlementStarted { run_id });
    info!(run = %run_id, balance = %balance, "Settlement run starting");

    // The lock is released on every exit path; a missed release would
    // only stall settlement for one TTL anyway.
    let outcome = self.run_pipeline(run_id, balance).await;
    self.locks.release(TREASURY_BURN_LOCK).await;

    match outcome {
      Ok(result) => {
        let _ = self.events.send(FlywheelEvent::SettlementCompleted {
          result: result.clone(),
          duration_secs: started.elapsed().as_secs_f64(),
        });
        Ok(Some(result))
      }
      Err(failure) => {
        let _ = self.events.send(FlywheelEvent::SettlementFailed {
          run_id,
          step: failure.step,
          kind: failure.kind,
        });
        Err(failure.source).with_context(|| {
          format!(
            "settlement run {run_id} aborted at step {}",
            failure.step
          )
        })
      }
    }
  }

  /// The nine-step pipeline. Runs strictly in order; every transaction
  /// is awaited to its receipt before the next step begins.
  async fn run_pipeline(
    &self,
    run_id: Uuid,
    balance: Decimal,
  ) -> Result<SettlementResult, StepFailure> {
    // Step 1: partition the balance.
    let plan = SettlementPlan::partition(balance, self.config.treasury.gas_reserve)
      .map_err(|e| {
        StepFailure::new(SettlementStep::Planned, FailureKind::Economic, e.into())
      })?;
    self.mark(run_id, SettlementStep::Planned).await;
    info!(
      run = %run_id,
      swap = %plan.swap_amount,
      topup = %plan.gas_topup,
      reserve = %plan.gas_reserve,
      "Settlement plan"
    );

    // Steps 2-3: quote and fix the minimum acceptable output.
    let quote = self
      .venue
      .quote_native_for_reward(plan.swap_amount)
      .await
      .map_err(|e| StepFailure::new(SettlementStep::Quoted, FailureKind::Transient, e))?;
    let min_out = minimum_output(quote, self.config.swap.slippage_fraction).map_err(|e| {
      StepFailure::new(SettlementStep::Quoted, FailureKind::Economic, e.into())
    })?;
    self.mark(run_id, SettlementStep::Quoted).await;
    info!(run = %run_id, quote = %quote, min_out = %min_out, "Swap quoted");

    if let Ok(gwei) = self.chain.gas_price_gwei().await {
      let _ = self.events.send(FlywheelEvent::GasPriceObserved { gwei });
    }

    // Step 4: wrap native into the wrapped token.
    let wrap = self
      .venue
      .wrap_native(plan.swap_amount)
      .await
      .map_err(|e| StepFailure::new(SettlementStep::Wrapped, FailureKind::Transient, e))?;
    confirmed("wrap", &wrap)
      .map_err(|e| StepFailure::new(SettlementStep::Wrapped, FailureKind::Unexpected, e))?;
    self.mark(run_id, SettlementStep::Wrapped).await;

    // Step 5a: approve the router for exactly the swap tranche.
    let approve = self
      .venue
      .approve_router(plan.swap_amount)
      .await
      .map_err(|e| StepFailure::new(SettlementStep::Approved, FailureKind::Transient, e))?;
    confirmed("approve", &approve)
      .map_err(|e| StepFailure::new(SettlementStep::Approved, FailureKind::Unexpected, e))?;
    self.mark(run_id, SettlementStep::Approved).await;

    // Step 5b: swap under the minimum-output floor. A revert here is the
    // slippage guard firing on-chain (stale or manipulated quote).
    let swap = self
      .venue
      .swap_wrapped_for_reward(plan.swap_amount, min_out)
      .await
      .map_err(|e| StepFailure::new(SettlementStep::Swapped, FailureKind::Transient, e))?;
    if !swap.success {
      return Err(StepFailure::new(
        SettlementStep::Swapped,
        FailureKind::Economic,
        anyhow!(
          "swap {} reverted: achievable output fell below minimum {min_out}",
          swap.tx_hash
        ),
      ));
    }
    self.mark(run_id, SettlementStep::Swapped).await;
    info!(run = %run_id, tx = %swap.tx_hash, "Swap confirmed");

    // Step 6: trust the balance, not the swap receipt.
    let reward_balance = self
      .chain
      .erc20_balance(&self.config.swap.reward_token, self.chain.address())
      .await
      .map_err(|e| {
        StepFailure::new(SettlementStep::ProceedsVerified, FailureKind::Transient, e)
      })?;

    if reward_balance <= Decimal::ZERO {
      // Swap confirmed yet nothing arrived. Never burn zero; record the
      // degraded run and stop before the burn and top-up.
      error!(
        run = %run_id,
        swap_tx = %swap.tx_hash,
        "Swap confirmed but reward balance reads zero; degraded run, burn skipped"
      );
      let result = SettlementResult {
        run_id,
        native_received: plan.balance,
        native_swapped: plan.swap_amount,
        native_reserved_for_gas: plan.gas_reserve,
        gas_topup: Decimal::ZERO,
        reward_burned: Decimal::ZERO,
        settlement_tx_id: None,
        degraded: true,
        completed_at: Utc::now(),
      };
      self.record(run_id, &result).await;
      return Ok(result);
    }
    self.mark(run_id, SettlementStep::ProceedsVerified).await;

    // Step 7: burn the full reward balance, not just the swap output.
    let burn = self
      .chain
      .transfer_erc20(
        &self.config.swap.reward_token,
        &self.config.treasury.burn_address,
        reward_balance,
      )
      .await
      .map_err(|e| StepFailure::new(SettlementStep::Burned, FailureKind::Transient, e))?;
    confirmed("burn", &burn)
      .map_err(|e| StepFailure::new(SettlementStep::Burned, FailureKind::Unexpected, e))?;
    self.mark(run_id, SettlementStep::Burned).await;
    info!(
      run = %run_id,
      tx = %burn.tx_hash,
      amount = %reward_balance,
      "Reward tokens burned"
    );

    // Step 8: gas top-up for the trading account.
    let topup = self
      .chain
      .transfer_native(&self.trading_address, plan.gas_topup)
      .await
      .map_err(|e| StepFailure::new(SettlementStep::ToppedUp, FailureKind::Transient, e))?;
    confirmed("top-up", &topup)
      .map_err(|e| StepFailure::new(SettlementStep::ToppedUp, FailureKind::Unexpected, e))?;
    self.mark(run_id, SettlementStep::ToppedUp).await;

    // Step 9: journal the run.
    let result = SettlementResult {
      run_id,
      native_received: plan.balance,
      native_swapped: plan.swap_amount,
      native_reserved_for_gas: plan.gas_reserve,
      gas_topup: plan.gas_topup,
      reward_burned: reward_balance,
      settlement_tx_id: Some(burn.tx_hash),
      degraded: false,
      completed_at: Utc::now(),
    };
    self.record(run_id, &result).await;
    Ok(result)
  }

  /// Checkpoint a completed step. Persistence trouble is logged, never
  /// allowed to abort a run whose transactions already landed.
  async fn mark(&self, run_id: Uuid, step: SettlementStep) {
    if let Err(e) = self.archive.record_step(run_id, step).await {
      warn!(run = %run_id, step = %step, error = %e, "Failed to checkpoint settlement step");
    }
    let _ = self
      .events
      .send(FlywheelEvent::SettlementStepDone { run_id, step });
  }

  /// Journal a finished run and retire its checkpoint.
  async fn record(&self, run_id: Uuid, result: &SettlementResult) {
    if let Err(e) = self.archive.append_result(result).await {
      warn!(run = %run_id, error = %e, "Failed to journal settlement result");
    }
    self.mark(run_id, SettlementStep::Recorded).await;
    if let Err(e) = self.archive.clear_checkpoint().await {
      warn!(run = %run_id, error = %e, "Failed to clear settlement checkpoint");
    }
  }

  /// Compute and log what a run would do, without submitting anything.
  async fn log_dry_run(&self, balance: Decimal) {
    match SettlementPlan::partition(balance, self.config.treasury.gas_reserve) {
      Ok(plan) => {
        let quote = self.venue.quote_native_for_reward(plan.swap_amount).await;
        let min_out = quote
          .as_ref()
          .ok()
          .and_then(|q| minimum_output(*q, self.config.swap.slippage_fraction).ok());
        info!(
          balance = %balance,
          swap = %plan.swap_amount,
          topup = %plan.gas_topup,
          quote = ?quote.ok(),
          min_out = ?min_out,
          "Dry-run: would settle treasury"
        );
      }
      Err(e) => {
        warn!(balance = %balance, error = %e, "Dry-run: settlement plan not viable");
      }
    }
  }

  /// At startup, surface any checkpoint a previous process left behind.
  async fn report_interrupted_run(&self) {
    match self.archive.interrupted_run().await {
      Ok(Some(checkpoint)) => {
        warn!(
          run = %checkpoint.run_id,
          last_step = %checkpoint.step,
          at = %checkpoint.updated_at,
          "Previous settlement run was interrupted; the next run retries the whole pipeline"
        );
      }
      Ok(None) => {}
      Err(e) => {
        warn!(error = %e, "Could not read settlement checkpoint");
      }
    }
  }
}

/// Reject mined-but-reverted transactions.
fn confirmed(label: &str, outcome: &CallOutcome) -> Result<()> {
  anyhow::ensure!(
    outcome.success,
    "{label} transaction {} reverted",
    outcome.tx_hash
  );
  Ok(())
}
