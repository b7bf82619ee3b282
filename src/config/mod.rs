//! Configuration Module - TOML-based Bot Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! credentials supplied via environment variables.
//! All contract addresses and economic parameters are externalized
//! here - nothing is hardcoded in the domain layer.

pub mod loader;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Top-level bot configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the bot begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Bot identity and metadata.
  pub bot: BotConfig,
  /// RPC endpoint and retry behavior.
  pub chain: ChainConfig,
  /// EIP-1559 fee caps applied to every transaction.
  pub gas: GasConfig,
  /// Marketplace gateway endpoint and limits.
  pub marketplace: MarketplaceConfig,
  /// Swap venue addresses and slippage tolerance.
  pub swap: SwapConfig,
  /// Acquisition loop parameters.
  pub flywheel: FlywheelConfig,
  /// Treasury settlement parameters.
  pub treasury: TreasuryConfig,
  /// Spending limits.
  pub risk: RiskConfig,
  /// Shared lock backend.
  pub lock: LockConfig,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
  /// Persistence configuration.
  pub persistence: PersistenceConfig,
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable bot name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Dry-run mode: evaluate everything, submit nothing.
  #[serde(default)]
  pub dry_run: bool,
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// JSON-RPC endpoint.
  pub rpc_url: String,
  /// Expected chain id; startup aborts on mismatch.
  pub chain_id: u64,
  /// Attempts for read-only calls before giving up.
  #[serde(default = "default_read_retries")]
  pub read_retries: u32,
  /// Fixed delay between read retries (milliseconds).
  #[serde(default = "default_retry_delay")]
  pub retry_delay_ms: u64,
}

/// EIP-1559 fee cap configuration.
///
/// Every transaction the bot signs carries these caps so a fee spike
/// cannot drain the gas reserve.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GasConfig {
  /// Cap on max fee per gas (gwei).
  #[serde(default = "default_max_fee")]
  pub max_fee_gwei: f64,
  /// Cap on priority fee per gas (gwei).
  #[serde(default = "default_priority_fee")]
  pub max_priority_fee_gwei: f64,
}

/// Marketplace gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
  /// Gateway REST base URL.
  pub base_url: String,
  /// NFT collection contract the bot trades.
  pub collection: String,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
  /// Per-minute request quota enforced client-side.
  #[serde(default = "default_requests_per_minute")]
  pub max_requests_per_minute: u32,
  /// Concurrent in-flight requests.
  #[serde(default = "default_concurrency")]
  pub max_concurrent_requests: usize,
  /// Retry attempts for retryable HTTP failures.
  #[serde(default = "default_retry_max")]
  pub retry_max: u32,
  /// Base delay for exponential retry backoff (milliseconds).
  #[serde(default = "default_retry_base_delay")]
  pub retry_base_delay_ms: u64,
}

/// Swap venue configuration (V2-style router).
#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
  /// Router contract address.
  pub router: String,
  /// Wrapped-native token address (the swap input).
  pub wrapped_native: String,
  /// Reward token address (the swap output, the token we burn).
  pub reward_token: String,
  /// Reward token decimals.
  #[serde(default = "default_token_decimals")]
  pub reward_token_decimals: u32,
  /// Slippage tolerance as a fraction (0.10 = accept 10% below quote).
  #[serde(default = "default_slippage")]
  pub slippage_fraction: Decimal,
}

/// Acquisition loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FlywheelConfig {
  /// Relist markup as a fraction (0.20 = ask 20% above cost).
  pub markup_fraction: Decimal,
  /// Affordability buffer as a fraction of the price (0.05 = 5%).
  #[serde(default = "default_buy_buffer")]
  pub buy_buffer_fraction: Decimal,
  /// Sleep when no candidate listing is available (seconds).
  #[serde(default = "default_idle_backoff")]
  pub idle_backoff_seconds: u64,
  /// Sleep after an unhandled cycle error before resuming (seconds).
  #[serde(default = "default_error_backoff")]
  pub error_backoff_seconds: u64,
  /// Interval between sale-watch polls (seconds).
  #[serde(default = "default_watch_poll")]
  pub watch_poll_seconds: u64,
  /// Sale-watch polls before the position is abandoned.
  #[serde(default = "default_watch_max_polls")]
  pub watch_max_polls: u32,
}

/// Treasury settlement configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TreasuryConfig {
  /// Balance poll interval (seconds).
  #[serde(default = "default_treasury_poll")]
  pub poll_seconds: u64,
  /// Minimum native balance before a settlement run starts.
  /// Must exceed the gas reserve by enough to make the swap worthwhile.
  pub min_settle_balance: Decimal,
  /// Native amount left behind for the treasury's own gas.
  pub gas_reserve: Decimal,
  /// Address the reward tokens are burned to.
  #[serde(default = "default_burn_address")]
  pub burn_address: String,
}

/// Spending limit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
  /// Cumulative purchase cap per UTC calendar day, in native units.
  pub daily_spend_cap: Decimal,
}

/// Shared lock backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
  /// Per-key JSON records under `lock.dir`; works across processes
  /// sharing the directory.
  File,
  /// In-process map; single-instance deployments and tests.
  Memory,
  /// Explicit no-op store. Every acquire succeeds; mutual exclusion
  /// is gone and the logs say so.
  Disabled,
}

/// Lock manager configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
  /// Which store backend to use.
  #[serde(default = "default_lock_backend")]
  pub backend: LockBackend,
  /// Directory for the file backend.
  #[serde(default = "default_lock_dir")]
  pub dir: String,
  /// Lock TTL in seconds; bounds how long a crashed holder blocks others.
  #[serde(default = "default_lock_ttl")]
  pub ttl_seconds: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable the observability HTTP server.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Bind address for /live, /ready, /health and /metrics.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Hours without a successful buy before /health flags an anomaly.
  #[serde(default = "default_stale_buy_hours")]
  pub stale_buy_hours: i64,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the settlement journal and checkpoint.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_read_retries() -> u32 {
  3
}

fn default_retry_delay() -> u64 {
  500
}

fn default_max_fee() -> f64 {
  50.0
}

fn default_priority_fee() -> f64 {
  2.0
}

fn default_timeout() -> u64 {
  30
}

fn default_requests_per_minute() -> u32 {
  60
}

fn default_concurrency() -> usize {
  4
}

fn default_retry_max() -> u32 {
  3
}

fn default_retry_base_delay() -> u64 {
  250
}

fn default_token_decimals() -> u32 {
  18
}

fn default_slippage() -> Decimal {
  dec!(0.10)
}

fn default_buy_buffer() -> Decimal {
  dec!(0.05)
}

fn default_idle_backoff() -> u64 {
  30
}

fn default_error_backoff() -> u64 {
  15
}

fn default_watch_poll() -> u64 {
  60
}

fn default_watch_max_polls() -> u32 {
  60
}

fn default_treasury_poll() -> u64 {
  300
}

fn default_burn_address() -> String {
  "0x000000000000000000000000000000000000dEaD".to_string()
}

fn default_lock_backend() -> LockBackend {
  LockBackend::File
}

fn default_lock_dir() -> String {
  "data/locks".to_string()
}

fn default_lock_ttl() -> u64 {
  600
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_stale_buy_hours() -> i64 {
  24
}

fn default_data_dir() -> String {
  "data".to_string()
}
