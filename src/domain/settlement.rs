//! Treasury settlement domain: the burn partition and the step ladder.
//!
//! All arithmetic is exact `Decimal`. A settlement plan carves the
//! treasury balance into a fixed gas reserve, a swap tranche (99% of the
//! remainder) and a gas top-up for the trading account (1%). The step
//! ladder gives the pipeline a recordable high-water mark.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Share of the distributable balance that is swapped into the reward token.
pub const SWAP_SHARE: Decimal = dec!(0.99);

/// Share of the distributable balance sent to the trading account for gas.
pub const TOPUP_SHARE: Decimal = dec!(0.01);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("treasury balance {balance} does not exceed gas reserve {reserve}")]
    BalanceBelowReserve { balance: Decimal, reserve: Decimal },
    #[error("gas reserve must be non-negative, got {0}")]
    NegativeReserve(Decimal),
    #[error("slippage fraction {0} outside [0, 1)")]
    InvalidSlippage(Decimal),
    #[error("swap quote must be positive, got {0}")]
    NonPositiveQuote(Decimal),
}

/// How one settlement run partitions the treasury balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    /// Full native balance observed at the start of the run.
    pub balance: Decimal,
    /// Fixed reserve left behind for the treasury's own gas.
    pub gas_reserve: Decimal,
    /// Amount wrapped and swapped for the reward token (99% of remainder).
    pub swap_amount: Decimal,
    /// Amount transferred to the trading account (1% of remainder).
    pub gas_topup: Decimal,
}

impl SettlementPlan {
    /// Partitions `balance` into reserve, swap tranche and top-up.
    ///
    /// `swap_amount + gas_topup + gas_reserve == balance` exactly; Decimal
    /// multiplication by 0.99 and 0.01 never rounds at these scales.
    pub fn partition(balance: Decimal, gas_reserve: Decimal) -> Result<Self, PlanError> {
        if gas_reserve < Decimal::ZERO {
            return Err(PlanError::NegativeReserve(gas_reserve));
        }
        if balance <= gas_reserve {
            return Err(PlanError::BalanceBelowReserve {
                balance,
                reserve: gas_reserve,
            });
        }
        let distributable = balance - gas_reserve;
        Ok(Self {
            balance,
            gas_reserve,
            swap_amount: (distributable * SWAP_SHARE).normalize(),
            gas_topup: (distributable * TOPUP_SHARE).normalize(),
        })
    }
}

/// Minimum acceptable swap output: `quote * (1 - slippage)`.
///
/// The quote comes from a read-only router call immediately before the
/// swap; the floor is what rejects stale or manipulated quotes on-chain.
pub fn minimum_output(quote: Decimal, slippage: Decimal) -> Result<Decimal, PlanError> {
    if quote <= Decimal::ZERO {
        return Err(PlanError::NonPositiveQuote(quote));
    }
    if slippage < Decimal::ZERO || slippage >= Decimal::ONE {
        return Err(PlanError::InvalidSlippage(slippage));
    }
    Ok((quote * (Decimal::ONE - slippage)).normalize())
}

/// Ordered ladder of settlement steps.
///
/// Each step begins only after the previous one's transaction confirmed;
/// the last completed step is checkpointed so an interrupted run can be
/// reported instead of silently vanishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettlementStep {
    /// Balance read and partitioned.
    Planned,
    /// Router quote obtained and minimum output fixed.
    Quoted,
    /// Native wrapped into the wrapped-native token.
    Wrapped,
    /// Router approved to spend the wrapped tranche.
    Approved,
    /// Swap executed with the minimum-output floor.
    Swapped,
    /// Reward-token balance re-read and found non-zero.
    ProceedsVerified,
    /// Full reward balance transferred to the burn address.
    Burned,
    /// Gas top-up transferred to the trading account.
    ToppedUp,
    /// Result journaled; run complete.
    Recorded,
}

impl SettlementStep {
    pub const ALL: [Self; 9] = [
        Self::Planned,
        Self::Quoted,
        Self::Wrapped,
        Self::Approved,
        Self::Swapped,
        Self::ProceedsVerified,
        Self::Burned,
        Self::ToppedUp,
        Self::Recorded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Quoted => "quoted",
            Self::Wrapped => "wrapped",
            Self::Approved => "approved",
            Self::Swapped => "swapped",
            Self::ProceedsVerified => "proceeds_verified",
            Self::Burned => "burned",
            Self::ToppedUp => "topped_up",
            Self::Recorded => "recorded",
        }
    }
}

impl std::fmt::Display for SettlementStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one settlement run, journaled whether complete or degraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Run identifier, shared with the checkpoint and log lines.
    pub run_id: Uuid,
    /// Native balance observed at the start of the run.
    pub native_received: Decimal,
    /// Native amount wrapped and swapped.
    pub native_swapped: Decimal,
    /// Native amount left behind as the gas reserve.
    pub native_reserved_for_gas: Decimal,
    /// Native amount sent to the trading account.
    pub gas_topup: Decimal,
    /// Reward tokens sent to the burn address (zero on a degraded run).
    pub reward_burned: Decimal,
    /// Burn transfer transaction hash. `None` when the run degraded
    /// because the swap produced no verifiable proceeds.
    pub settlement_tx_id: Option<String>,
    /// True when the swap confirmed but the reward balance read back zero,
    /// so the burn and nothing after it executed.
    pub degraded: bool,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
}
