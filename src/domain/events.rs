//! Events both engines broadcast for observability and coordination.
//!
//! The engines never call the metrics layer directly; they publish
//! `FlywheelEvent`s on a broadcast channel. The health recorder folds
//! every event into its counters, and the treasury settler listens for
//! `SaleDetected` to advance its next balance poll. A dropped or lagged
//! event can only ever cost telemetry, never correctness.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::failure::FailureKind;
use super::flywheel::{SkipReason, TokenId};
use super::settlement::{SettlementResult, SettlementStep};

/// Which signing account a balance observation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Trading,
    Treasury,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trading => "trading",
            Self::Treasury => "treasury",
        }
    }
}

/// Why a settlement tick ended without a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementSkip {
    /// Treasury balance below the settle threshold.
    BelowThreshold,
    /// Another holder owns the `treasury-burn` lock.
    LockBusy,
    /// Dry-run mode: plan computed, nothing submitted.
    DryRun,
}

impl SettlementSkip {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelowThreshold => "below_threshold",
            Self::LockBusy => "lock_busy",
            Self::DryRun => "dry_run",
        }
    }
}

/// Telemetry and coordination events published by the engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlywheelEvent {
    /// A candidate was rejected before any money moved.
    ListingSkipped { token_id: TokenId, reason: SkipReason },
    /// Purchase confirmed and counted against the daily cap.
    BuyRecorded { token_id: TokenId, cost: Decimal },
    /// Purchase transaction failed or reverted.
    BuyFailed { token_id: TokenId },
    /// Paid but not owner: integrity violation, no position.
    OwnershipFailed { token_id: TokenId },
    /// Ask accepted by the marketplace.
    Relisted { token_id: TokenId, ask: Decimal },
    /// Our ask filled. Nudges the settlement poller.
    SaleDetected { token_id: TokenId, proceeds: Decimal },
    /// Watch window exhausted; position abandoned, item stays listed.
    WatchTimedOut { token_id: TokenId },
    /// Our ask vanished (cancelled/expired) before filling.
    Delisted { token_id: TokenId },
    /// Unhandled error in an acquisition cycle; loop slept and resumed.
    CycleFailed { kind: FailureKind },
    /// Daily spend after the latest purchase.
    SpendRecorded { day_total: Decimal },
    /// Last-seen native balance of one of the accounts.
    BalanceObserved { account: AccountKind, balance: Decimal },
    /// Gas price sampled during a settlement run.
    GasPriceObserved { gwei: f64 },
    /// Lock store unreachable; acquisition proceeded fail-open.
    LockFailOpen { key: String },
    /// Settlement pipeline started under the lock.
    SettlementStarted { run_id: uuid::Uuid },
    /// One pipeline step confirmed.
    SettlementStepDone { run_id: uuid::Uuid, step: SettlementStep },
    /// Pipeline finished; `result.degraded` distinguishes burn-skipped runs.
    SettlementCompleted {
        result: SettlementResult,
        duration_secs: f64,
    },
    /// Pipeline aborted at `step`; lock released, no result recorded.
    SettlementFailed {
        run_id: uuid::Uuid,
        step: SettlementStep,
        kind: FailureKind,
    },
    /// A settlement tick ended without running the pipeline.
    SettlementSkipped { reason: SettlementSkip },
}
