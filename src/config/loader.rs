//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    chain_id = config.chain.chain_id,
    markup = %config.flywheel.markup_fraction,
    daily_cap = %config.risk.daily_spend_cap,
    lock_backend = ?config.lock.backend,
    "Configuration loaded successfully"
  );

  Ok(config)
}

fn ensure_address(name: &str, value: &str) -> Result<()> {
  anyhow::ensure!(
    value.len() == 42
      && value.starts_with("0x")
      && value[2..].chars().all(|c| c.is_ascii_hexdigit()),
    "{} must be a 0x-prefixed 20-byte hex address, got '{}'",
    name,
    value
  );
  Ok(())
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Well-formed contract addresses
/// - Fractions inside their valid ranges
/// - Positive caps, thresholds and TTLs
/// - A settle threshold that actually clears the gas reserve
fn validate_config(config: &AppConfig) -> Result<()> {
  // Chain validation
  anyhow::ensure!(!config.chain.rpc_url.is_empty(), "RPC URL must not be empty");
  anyhow::ensure!(config.chain.chain_id > 0, "chain_id must be positive");
  anyhow::ensure!(
    config.chain.read_retries > 0,
    "read_retries must be at least 1"
  );

  // Gas validation
  anyhow::ensure!(
    config.gas.max_fee_gwei > 0.0,
    "max_fee_gwei must be positive, got {}",
    config.gas.max_fee_gwei
  );
  anyhow::ensure!(
    config.gas.max_priority_fee_gwei > 0.0
      && config.gas.max_priority_fee_gwei <= config.gas.max_fee_gwei,
    "max_priority_fee_gwei must be in (0, max_fee_gwei], got {}",
    config.gas.max_priority_fee_gwei
  );

  // Marketplace validation
  anyhow::ensure!(
    !config.marketplace.base_url.is_empty(),
    "Marketplace base URL must not be empty"
  );
  ensure_address("marketplace.collection", &config.marketplace.collection)?;
  anyhow::ensure!(
    config.marketplace.max_requests_per_minute > 0,
    "max_requests_per_minute must be positive"
  );
  anyhow::ensure!(
    config.marketplace.max_concurrent_requests > 0,
    "max_concurrent_requests must be positive"
  );

  // Swap validation
  ensure_address("swap.router", &config.swap.router)?;
  ensure_address("swap.wrapped_native", &config.swap.wrapped_native)?;
  ensure_address("swap.reward_token", &config.swap.reward_token)?;
  anyhow::ensure!(
    config.swap.reward_token_decimals <= 18,
    "reward_token_decimals must be at most 18, got {}",
    config.swap.reward_token_decimals
  );
  anyhow::ensure!(
    config.swap.slippage_fraction > Decimal::ZERO
      && config.swap.slippage_fraction < Decimal::ONE,
    "slippage_fraction must be in (0, 1), got {}",
    config.swap.slippage_fraction
  );

  // Flywheel validation
  anyhow::ensure!(
    config.flywheel.markup_fraction > Decimal::ZERO,
    "markup_fraction must be positive, got {}",
    config.flywheel.markup_fraction
  );
  anyhow::ensure!(
    config.flywheel.buy_buffer_fraction >= Decimal::ZERO
      && config.flywheel.buy_buffer_fraction < Decimal::ONE,
    "buy_buffer_fraction must be in [0, 1), got {}",
    config.flywheel.buy_buffer_fraction
  );
  anyhow::ensure!(
    config.flywheel.watch_max_polls > 0,
    "watch_max_polls must be at least 1"
  );
  anyhow::ensure!(
    config.flywheel.watch_poll_seconds > 0,
    "watch_poll_seconds must be positive"
  );

  // Treasury validation
  anyhow::ensure!(
    config.treasury.gas_reserve >= Decimal::ZERO,
    "gas_reserve must be non-negative, got {}",
    config.treasury.gas_reserve
  );
  anyhow::ensure!(
    config.treasury.min_settle_balance > config.treasury.gas_reserve,
    "min_settle_balance ({}) must exceed gas_reserve ({}) or settlement can never run",
    config.treasury.min_settle_balance,
    config.treasury.gas_reserve
  );
  ensure_address("treasury.burn_address", &config.treasury.burn_address)?;
  anyhow::ensure!(
    config.treasury.poll_seconds > 0,
    "treasury poll_seconds must be positive"
  );

  // Risk validation
  anyhow::ensure!(
    config.risk.daily_spend_cap > Decimal::ZERO,
    "daily_spend_cap must be positive, got {}",
    config.risk.daily_spend_cap
  );

  // Lock validation
  anyhow::ensure!(
    config.lock.ttl_seconds > 0,
    "lock ttl_seconds must be positive"
  );

  Ok(())
}
