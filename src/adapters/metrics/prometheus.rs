//! Prometheus Metrics Registry - Flywheel Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers buys, relists, sales, settlement runs, burned reward tokens,
//! balances, daily spend, gas price, and failures by taxonomy class.

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use tracing::error;

/// Centralized Prometheus metrics for the flywheel bot.
///
/// All metrics follow the naming convention `flywheel_bot_*`. Counters
/// are monotonic over the process lifetime; restarts reset them, the
/// journal is the durable record.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Total purchases confirmed and counted against the daily cap.
    pub buys: IntCounter,
    /// Total asks accepted by the marketplace.
    pub relists: IntCounter,
    /// Total asks observed filled within the watch window.
    pub sales: IntCounter,
    /// Candidates rejected before any money moved, by reason.
    pub listings_skipped: IntCounterVec,
    /// Counted failures, by taxonomy class.
    pub failures: IntCounterVec,
    /// Settlement runs by outcome (completed, degraded, failed).
    pub settlement_runs: IntCounterVec,
    /// Settlement ticks that ended without a pipeline run, by reason.
    pub settlement_skips: IntCounterVec,
    /// Cumulative reward tokens sent to the burn address.
    pub reward_burned: Gauge,
    /// Last-seen native balance per signing account.
    pub native_balance: GaugeVec,
    /// Spend recorded in the current UTC day.
    pub daily_spend: Gauge,
    /// Gas price sampled during settlement (gwei).
    pub gas_price_gwei: Gauge,
    /// Whether a settlement pipeline is running (1 = yes).
    pub settlement_active: Gauge,
    /// Lock acquisitions granted fail-open because the store erred.
    pub lock_fail_open: IntCounter,
    /// Wall-clock duration of completed settlement runs (seconds).
    pub settlement_duration: Histogram,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let buys = IntCounter::new("flywheel_bot_buys_total", "Total purchases confirmed")?;

        let relists = IntCounter::new(
            "flywheel_bot_relists_total",
            "Total asks accepted by the marketplace",
        )?;

        let sales = IntCounter::new(
            "flywheel_bot_sales_total",
            "Total asks observed filled within the watch window",
        )?;

        let listings_skipped = IntCounterVec::new(
            Opts::new(
                "flywheel_bot_listings_skipped_total",
                "Candidates rejected before buying",
            ),
            &["reason"],
        )?;

        let failures = IntCounterVec::new(
            Opts::new(
                "flywheel_bot_failures_total",
                "Counted failures by taxonomy class",
            ),
            &["kind"],
        )?;

        let settlement_runs = IntCounterVec::new(
            Opts::new(
                "flywheel_bot_settlement_runs_total",
                "Settlement runs by outcome",
            ),
            &["outcome"],
        )?;

        let settlement_skips = IntCounterVec::new(
            Opts::new(
                "flywheel_bot_settlement_skips_total",
                "Settlement ticks that ended without a pipeline run",
            ),
            &["reason"],
        )?;

        let reward_burned = Gauge::new(
            "flywheel_bot_reward_burned_total",
            "Cumulative reward tokens sent to the burn address",
        )?;

        let native_balance = GaugeVec::new(
            Opts::new(
                "flywheel_bot_native_balance",
                "Last-seen native balance per signing account",
            ),
            &["account"],
        )?;

        let daily_spend = Gauge::new(
            "flywheel_bot_daily_spend",
            "Purchase spend recorded in the current UTC day",
        )?;

        let gas_price_gwei = Gauge::new(
            "flywheel_bot_gas_price_gwei",
            "Gas price sampled during settlement in gwei",
        )?;

        let settlement_active = Gauge::new(
            "flywheel_bot_settlement_active",
            "Whether a settlement pipeline is running (1=yes, 0=no)",
        )?;

        let lock_fail_open = IntCounter::new(
            "flywheel_bot_lock_fail_open_total",
            "Lock acquisitions granted fail-open on store errors",
        )?;

        let settlement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "flywheel_bot_settlement_duration_seconds",
                "Wall-clock duration of completed settlement runs",
            )
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(buys.clone()))?;
        registry.register(Box::new(relists.clone()))?;
        registry.register(Box::new(sales.clone()))?;
        registry.register(Box::new(listings_skipped.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(settlement_runs.clone()))?;
        registry.register(Box::new(settlement_skips.clone()))?;
        registry.register(Box::new(reward_burned.clone()))?;
        registry.register(Box::new(native_balance.clone()))?;
        registry.register(Box::new(daily_spend.clone()))?;
        registry.register(Box::new(gas_price_gwei.clone()))?;
        registry.register(Box::new(settlement_active.clone()))?;
        registry.register(Box::new(lock_fail_open.clone()))?;
        registry.register(Box::new(settlement_duration.clone()))?;

        Ok(Self {
            registry,
            buys,
            relists,
            sales,
            listings_skipped,
            failures,
            settlement_runs,
            settlement_skips,
            reward_burned,
            native_balance,
            daily_spend,
            gas_price_gwei,
            settlement_active,
            lock_fail_open,
            settlement_duration,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(error = %e, "Failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
