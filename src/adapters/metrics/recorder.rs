//! Health Recorder - Event-fed Counters, Timestamps and Anomaly Checks
//!
//! Subscribes to the engines' event bus and folds every `FlywheelEvent`
//! into process-local counters, last-activity timestamps, last-seen
//! balances and the Prometheus registry. The snapshot it produces backs
//! the `/health` endpoint; it is derived observability, never
//! authoritative for bot behavior.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::{AccountKind, FlywheelEvent};
use crate::domain::failure::FailureKind;

use super::prometheus::MetricsRegistry;

/// Consecutive failed settlement runs that flag an anomaly.
const FAILURE_STREAK_THRESHOLD: u64 = 3;

/// Mutable last-activity and last-seen state behind one lock.
#[derive(Debug, Default)]
struct Activity {
    last_buy_at: Option<DateTime<Utc>>,
    last_sale_at: Option<DateTime<Utc>>,
    last_burn_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    trading_balance: Option<Decimal>,
    treasury_balance: Option<Decimal>,
    daily_spend: Decimal,
    reward_burned_total: Decimal,
}

/// JSON payload served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub started_at: DateTime<Utc>,
    pub buys: u64,
    pub relists: u64,
    pub sales: u64,
    pub settlements_completed: u64,
    pub settlements_degraded: u64,
    pub settlements_failed: u64,
    pub settlement_failure_streak: u64,
    pub failures_transient: u64,
    pub failures_economic: u64,
    pub failures_integrity: u64,
    pub failures_unexpected: u64,
    pub lock_fail_opens: u64,
    pub last_buy_at: Option<DateTime<Utc>>,
    pub last_sale_at: Option<DateTime<Utc>>,
    pub last_burn_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub trading_balance: Option<Decimal>,
    pub treasury_balance: Option<Decimal>,
    pub daily_spend: Decimal,
    pub reward_burned_total: Decimal,
    pub anomalies: Vec<String>,
}

/// Folds engine events into counters, gauges and timestamps.
///
/// Engines publish events and move on; the recorder is the single
/// writer of all observability state, so neither engine ever touches
/// the metrics registry directly.
pub struct HealthRecorder {
    metrics: Arc<MetricsRegistry>,
    started_at: DateTime<Utc>,
    /// Hours without a successful buy before `/health` flags staleness.
    stale_buy_hours: i64,
    buys: AtomicU64,
    relists: AtomicU64,
    sales: AtomicU64,
    settlements_completed: AtomicU64,
    settlements_degraded: AtomicU64,
    settlements_failed: AtomicU64,
    /// Failed runs since the last completed one.
    failure_streak: AtomicU64,
    failures_transient: AtomicU64,
    failures_economic: AtomicU64,
    failures_integrity: AtomicU64,
    failures_unexpected: AtomicU64,
    lock_fail_opens: AtomicU64,
    activity: RwLock<Activity>,
}

impl HealthRecorder {
    pub fn new(metrics: Arc<MetricsRegistry>, stale_buy_hours: i64) -> Self {
        Self {
            metrics,
            started_at: Utc::now(),
            stale_buy_hours,
            buys: AtomicU64::new(0),
            relists: AtomicU64::new(0),
            sales: AtomicU64::new(0),
            settlements_completed: AtomicU64::new(0),
            settlements_degraded: AtomicU64::new(0),
            settlements_failed: AtomicU64::new(0),
            failure_streak: AtomicU64::new(0),
            failures_transient: AtomicU64::new(0),
            failures_economic: AtomicU64::new(0),
            failures_integrity: AtomicU64::new(0),
            failures_unexpected: AtomicU64::new(0),
            lock_fail_opens: AtomicU64::new(0),
            activity: RwLock::new(Activity::default()),
        }
    }

    /// Consume bus events until the channel closes or shutdown fires.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<FlywheelEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Shutdown signal received, stopping health recorder");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => self.record(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Only telemetry is lost; correctness never
                        // depends on the recorder keeping up.
                        warn!(skipped, "Health recorder lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    /// Fold one event into counters and the Prometheus registry.
    pub fn record(&self, event: &FlywheelEvent) {
        match event {
            FlywheelEvent::ListingSkipped { reason, .. } => {
                self.metrics
                    .listings_skipped
                    .with_label_values(&[&reason.to_string()])
                    .inc();
            }
            FlywheelEvent::BuyRecorded { .. } => {
                self.buys.fetch_add(1, Ordering::Relaxed);
                self.metrics.buys.inc();
                self.with_activity(|a| a.last_buy_at = Some(Utc::now()));
            }
            FlywheelEvent::BuyFailed { .. } => {
                self.count_failure(FailureKind::Transient);
            }
            FlywheelEvent::OwnershipFailed { .. } => {
                self.count_failure(FailureKind::Integrity);
            }
            FlywheelEvent::Relisted { .. } => {
                self.relists.fetch_add(1, Ordering::Relaxed);
                self.metrics.relists.inc();
            }
            FlywheelEvent::SaleDetected { .. } => {
                self.sales.fetch_add(1, Ordering::Relaxed);
                self.metrics.sales.inc();
                self.with_activity(|a| a.last_sale_at = Some(Utc::now()));
            }
            FlywheelEvent::WatchTimedOut { .. } | FlywheelEvent::Delisted { .. } => {}
            FlywheelEvent::CycleFailed { kind } => {
                self.count_failure(*kind);
            }
            FlywheelEvent::SpendRecorded { day_total } => {
                self.with_activity(|a| a.daily_spend = *day_total);
                self.metrics.daily_spend.set(decimal_gauge(*day_total));
            }
            FlywheelEvent::BalanceObserved { account, balance } => {
                self.with_activity(|a| match account {
                    AccountKind::Trading => a.trading_balance = Some(*balance),
                    AccountKind::Treasury => a.treasury_balance = Some(*balance),
                });
                self.metrics
                    .native_balance
                    .with_label_values(&[account.as_str()])
                    .set(decimal_gauge(*balance));
            }
            FlywheelEvent::GasPriceObserved { gwei } => {
                self.metrics.gas_price_gwei.set(*gwei);
            }
            FlywheelEvent::LockFailOpen { .. } => {
                self.lock_fail_opens.fetch_add(1, Ordering::Relaxed);
                self.metrics.lock_fail_open.inc();
            }
            FlywheelEvent::SettlementStarted { .. } => {
                self.metrics.settlement_active.set(1.0);
            }
            FlywheelEvent::SettlementStepDone { .. } => {}
            FlywheelEvent::SettlementCompleted {
                result,
                duration_secs,
            } => {
                self.metrics.settlement_active.set(0.0);
                self.metrics.settlement_duration.observe(*duration_secs);
                self.failure_streak.store(0, Ordering::Relaxed);
                if result.degraded {
                    self.settlements_degraded.fetch_add(1, Ordering::Relaxed);
                    self.metrics
                        .settlement_runs
                        .with_label_values(&["degraded"])
                        .inc();
                    self.count_failure(FailureKind::Integrity);
                } else {
                    self.settlements_completed.fetch_add(1, Ordering::Relaxed);
                    self.metrics
                        .settlement_runs
                        .with_label_values(&["completed"])
                        .inc();
                    self.with_activity(|a| {
                        a.last_burn_at = Some(result.completed_at);
                        a.reward_burned_total += result.reward_burned;
                    });
                    let total = self
                        .activity
                        .read()
                        .map(|a| a.reward_burned_total)
                        .unwrap_or_default();
                    self.metrics.reward_burned.set(decimal_gauge(total));
                }
            }
            FlywheelEvent::SettlementFailed { kind, .. } => {
                self.metrics.settlement_active.set(0.0);
                self.settlements_failed.fetch_add(1, Ordering::Relaxed);
                self.failure_streak.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .settlement_runs
                    .with_label_values(&["failed"])
                    .inc();
                self.count_failure(*kind);
            }
            FlywheelEvent::SettlementSkipped { reason } => {
                self.metrics
                    .settlement_skips
                    .with_label_values(&[reason.as_str()])
                    .inc();
            }
        }
    }

    /// Snapshot for `/health`, including current anomaly findings.
    pub fn snapshot(&self) -> HealthSnapshot {
        let activity = self.activity.read();
        let (
            last_buy_at,
            last_sale_at,
            last_burn_at,
            last_failure_at,
            trading_balance,
            treasury_balance,
            daily_spend,
            reward_burned_total,
        ) = match &activity {
            Ok(a) => (
                a.last_buy_at,
                a.last_sale_at,
                a.last_burn_at,
                a.last_failure_at,
                a.trading_balance,
                a.treasury_balance,
                a.daily_spend,
                a.reward_burned_total,
            ),
            Err(_) => Default::default(),
        };
        drop(activity);

        let mut snapshot = HealthSnapshot {
            started_at: self.started_at,
            buys: self.buys.load(Ordering::Relaxed),
            relists: self.relists.load(Ordering::Relaxed),
            sales: self.sales.load(Ordering::Relaxed),
            settlements_completed: self.settlements_completed.load(Ordering::Relaxed),
            settlements_degraded: self.settlements_degraded.load(Ordering::Relaxed),
            settlements_failed: self.settlements_failed.load(Ordering::Relaxed),
            settlement_failure_streak: self.failure_streak.load(Ordering::Relaxed),
            failures_transient: self.failures_transient.load(Ordering::Relaxed),
            failures_economic: self.failures_economic.load(Ordering::Relaxed),
            failures_integrity: self.failures_integrity.load(Ordering::Relaxed),
            failures_unexpected: self.failures_unexpected.load(Ordering::Relaxed),
            lock_fail_opens: self.lock_fail_opens.load(Ordering::Relaxed),
            last_buy_at,
            last_sale_at,
            last_burn_at,
            last_failure_at,
            trading_balance,
            treasury_balance,
            daily_spend,
            reward_burned_total,
            anomalies: Vec::new(),
        };
        snapshot.anomalies = self.anomalies(&snapshot, Utc::now());
        snapshot
    }

    /// Informational anomaly checks for operators. Never gates behavior.
    fn anomalies(&self, snapshot: &HealthSnapshot, now: DateTime<Utc>) -> Vec<String> {
        let mut findings = Vec::new();
        let stale_after = ChronoDuration::hours(self.stale_buy_hours);

        let buy_reference = snapshot.last_buy_at.unwrap_or(snapshot.started_at);
        if now - buy_reference > stale_after {
            findings.push(format!(
                "no successful buy in over {} hours",
                self.stale_buy_hours
            ));
        }

        if snapshot.settlement_failure_streak >= FAILURE_STREAK_THRESHOLD {
            findings.push(format!(
                "{} consecutive settlement runs failed",
                snapshot.settlement_failure_streak
            ));
        }

        if let Some(sale) = snapshot.last_sale_at {
            let burned_since = snapshot.last_burn_at.is_some_and(|burn| burn >= sale);
            if !burned_since && now - sale > stale_after {
                findings.push(format!(
                    "sale detected over {} hours ago with no burn since",
                    self.stale_buy_hours
                ));
            }
        }

        findings
    }

    fn count_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Transient => &self.failures_transient,
            FailureKind::Economic => &self.failures_economic,
            FailureKind::Integrity => &self.failures_integrity,
            FailureKind::Unexpected => &self.failures_unexpected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.metrics.failures.with_label_values(&[kind.as_str()]).inc();
        self.with_activity(|a| a.last_failure_at = Some(Utc::now()));
    }

    fn with_activity(&self, f: impl FnOnce(&mut Activity)) {
        if let Ok(mut activity) = self.activity.write() {
            f(&mut activity);
        }
    }
}

/// Decimal to f64 for Prometheus gauges; precision loss is acceptable
/// in telemetry, never in settlement math.
fn decimal_gauge(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settlement::SettlementResult;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn recorder() -> HealthRecorder {
        HealthRecorder::new(Arc::new(MetricsRegistry::new().unwrap()), 24)
    }

    fn completed_result(burned: Decimal, degraded: bool) -> SettlementResult {
        SettlementResult {
            run_id: Uuid::new_v4(),
            native_received: dec!(10),
            native_swapped: dec!(9.405),
            native_reserved_for_gas: dec!(0.5),
            gas_topup: if degraded { Decimal::ZERO } else { dec!(0.095) },
            reward_burned: burned,
            settlement_tx_id: (!degraded).then(|| "0xburn".to_string()),
            degraded,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_buy_and_sale_update_counters_and_timestamps() {
        let rec = recorder();
        rec.record(&FlywheelEvent::BuyRecorded {
            token_id: "1".into(),
            cost: dec!(1.2),
        });
        rec.record(&FlywheelEvent::SaleDetected {
            token_id: "1".into(),
            proceeds: dec!(1.5),
        });

        let snap = rec.snapshot();
        assert_eq!(snap.buys, 1);
        assert_eq!(snap.sales, 1);
        assert!(snap.last_buy_at.is_some());
        assert!(snap.last_sale_at.is_some());
    }

    #[test]
    fn test_degraded_run_counts_as_integrity_failure() {
        let rec = recorder();
        rec.record(&FlywheelEvent::SettlementCompleted {
            result: completed_result(Decimal::ZERO, true),
            duration_secs: 3.0,
        });

        let snap = rec.snapshot();
        assert_eq!(snap.settlements_degraded, 1);
        assert_eq!(snap.settlements_completed, 0);
        assert_eq!(snap.failures_integrity, 1);
        assert!(snap.last_burn_at.is_none());
    }

    #[test]
    fn test_completion_resets_failure_streak() {
        let rec = recorder();
        for _ in 0..3 {
            rec.record(&FlywheelEvent::SettlementFailed {
                run_id: Uuid::new_v4(),
                step: crate::domain::settlement::SettlementStep::Swapped,
                kind: FailureKind::Transient,
            });
        }
        assert!(
            rec.snapshot()
                .anomalies
                .iter()
                .any(|a| a.contains("consecutive settlement runs failed"))
        );

        rec.record(&FlywheelEvent::SettlementCompleted {
            result: completed_result(dec!(5000), false),
            duration_secs: 12.0,
        });
        let snap = rec.snapshot();
        assert_eq!(snap.settlement_failure_streak, 0);
        assert_eq!(snap.reward_burned_total, dec!(5000));
        assert!(snap.last_burn_at.is_some());
    }

    #[test]
    fn test_stale_buy_anomaly_uses_start_time_before_first_buy() {
        let rec = HealthRecorder::new(Arc::new(MetricsRegistry::new().unwrap()), 0);
        let snap = rec.snapshot();
        // stale_buy_hours of zero means any idle time flags immediately
        assert!(snap.anomalies.iter().any(|a| a.contains("no successful buy")));
    }

    #[test]
    fn test_balance_observation_is_reflected() {
        let rec = recorder();
        rec.record(&FlywheelEvent::BalanceObserved {
            account: AccountKind::Treasury,
            balance: dec!(42.5),
        });
        assert_eq!(rec.snapshot().treasury_balance, Some(dec!(42.5)));
    }
}
