//! NFT Flywheel Bot — Entry Point
//!
//! Initializes configuration, logging, signers, chain connections and
//! the two engine loops. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load marketplace auth from env (MARKET_API_KEY, MARKET_API_SECRET)
//! 4. Load signers from env (TRADING_PRIVATE_KEY, TREASURY_PRIVATE_KEY)
//! 5. Connect one EVM provider per account, validate chain id
//! 6. Build adapters: gateway, chain clients, router venue, lock store,
//!    settlement archive
//! 7. Spawn observability server (/live /ready /health /metrics)
//! 8. Spawn the health recorder event pump
//! 9. Spawn FlywheelEngine and TreasurySettler loops
//! 10. Wait for SIGINT → graceful shutdown (signal→drain→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::api::auth::GatewayAuth;
use adapters::api::client::{GatewayClient, GatewayClientConfig};
use adapters::api::gateway::MarketGateway;
use adapters::chain::{EvmChainClient, EvmProvider, V2RouterVenue};
use adapters::chain::provider::signer_from_env;
use adapters::locks::build_lock_store;
use adapters::metrics::{HealthRecorder, MetricsRegistry, ObservabilityServer};
use adapters::persistence::ArchiveImpl;
use domain::events::FlywheelEvent;
use usecases::flywheel::FlywheelEngine;
use usecases::lock_manager::LockManager;
use usecases::treasury::TreasurySettler;

/// Capacity of the engine event bus. Lagging subscribers lose
/// telemetry only, never correctness.
const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config =
        config::loader::load_config("config.toml").context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        dry_run = config.bot.dry_run,
        collection = %config.marketplace.collection,
        "Starting NFT Flywheel Bot"
    );

    // ── 3. Shutdown and event channels ──────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let (ready_tx, ready_rx) = watch::channel(true);
    let (events_tx, _events_rx) = broadcast::channel::<FlywheelEvent>(EVENT_BUS_CAPACITY);

    // ── 4. Marketplace gateway (auth + client from env/config) ─
    let auth = Arc::new(
        GatewayAuth::from_env().context("Failed to load marketplace credentials from env")?,
    );
    let gateway_client = Arc::new(
        GatewayClient::new(
            Arc::clone(&auth),
            GatewayClientConfig::from_config(&config.marketplace),
        )
        .context("Failed to create gateway client")?,
    );
    let market = Arc::new(MarketGateway::new(
        Arc::clone(&gateway_client),
        config.marketplace.collection.clone(),
    ));

    // ── 5. One provider per signing account, chain id checked ──
    let trading_signer =
        signer_from_env("TRADING_PRIVATE_KEY").context("Failed to load trading signer")?;
    let treasury_signer =
        signer_from_env("TREASURY_PRIVATE_KEY").context("Failed to load treasury signer")?;

    let trading_provider = Arc::new(
        EvmProvider::connect(&config.chain, trading_signer)
            .await
            .context("Failed to connect trading provider")?,
    );
    let treasury_provider = Arc::new(
        EvmProvider::connect(&config.chain, treasury_signer)
            .await
            .context("Failed to connect treasury provider")?,
    );
    let trading_address = trading_provider.address().to_string();

    // ── 6. Chain clients, swap venue, locks, archive ────────
    let trading_chain = Arc::new(EvmChainClient::new(Arc::clone(&trading_provider), &config));
    let treasury_chain = Arc::new(EvmChainClient::new(Arc::clone(&treasury_provider), &config));
    let venue = Arc::new(
        V2RouterVenue::new(Arc::clone(&treasury_provider), &config)
            .await
            .context("Failed to bind swap venue contracts")?,
    );
    let lock_store = build_lock_store(&config.lock)
        .await
        .context("Failed to build lock store")?;
    let locks = LockManager::new(
        Arc::clone(&lock_store),
        config.lock.ttl_seconds,
        events_tx.clone(),
    );
    let archive = Arc::new(
        ArchiveImpl::from_data_dir(&config.persistence.data_dir)
            .await
            .context("Failed to open settlement archive")?,
    );

    // ── 7. Observability: registry, recorder, HTTP server ───
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics registry")?);
    let recorder = Arc::new(HealthRecorder::new(
        Arc::clone(&metrics),
        config.metrics.stale_buy_hours,
    ));

    let server_handle = if config.metrics.enabled {
        let server = ObservabilityServer::new(
            Arc::clone(&recorder),
            Arc::clone(&metrics),
            Arc::clone(&lock_store),
            ready_rx,
            config.metrics.bind_address.clone(),
        );
        let server_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                error!(error = %e, "Observability server failed");
            }
        }))
    } else {
        warn!("Observability server disabled by configuration");
        None
    };

    // ── 8. Health recorder event pump ───────────────────────
    let recorder_handle = tokio::spawn(Arc::clone(&recorder).run(
        events_tx.subscribe(),
        shutdown_tx.subscribe(),
    ));

    // ── 9. Engine loops ─────────────────────────────────────
    let mut flywheel = FlywheelEngine::new(
        market,
        trading_chain,
        config.clone(),
        events_tx.clone(),
        shutdown_tx.subscribe(),
    );
    let flywheel_handle = tokio::spawn(async move {
        if let Err(e) = flywheel.run().await {
            error!(error = %e, "Flywheel engine failed");
        }
    });

    let mut settler = TreasurySettler::new(
        treasury_chain,
        venue,
        archive,
        locks,
        config.clone(),
        trading_address,
        events_tx.clone(),
        shutdown_tx.subscribe(),
    );
    let settler_handle = tokio::spawn(async move {
        if let Err(e) = settler.run().await {
            error!(error = %e, "Treasury settler failed");
        }
    });

    info!("All tasks spawned — bot is running");

    // ── 10. Wait for SIGINT ─────────────────────────────────
    signal::ctrl_c()
        .await
        .context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    // Signal all tasks, flip readiness to 503, then wait bounded.
    let _ = shutdown_tx.send(());
    let _ = ready_tx.send(false);

    let _ = tokio::time::timeout(std::time::Duration::from_secs(30), flywheel_handle).await;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(30), settler_handle).await;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), recorder_handle).await;
    if let Some(handle) = server_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}
