//! EVM RPC Provider - alloy-rs 0.9 Connection Management
//!
//! Manages the wallet-backed connection to the chain via alloy-rs.
//! Validates the chain ID at startup and exposes a shared provider
//! instance for all on-chain operations.
//!
//! In alloy 0.9, `ProviderBuilder::new().wallet(..).on_http()` returns
//! a complex filler type over the HTTP transport. We store it as a
//! type-erased `dyn Provider<Http<Client>>` to keep the API clean
//! across the adapter layer.

use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::config::ChainConfig;
use crate::ports::chain_client::CallOutcome;

use super::abi::{NATIVE_DECIMALS, raw_to_decimal};

/// Load a signer from a hex private key in the given environment
/// variable. Accepts an optional `0x` prefix and surrounding whitespace;
/// never logs key material.
pub fn signer_from_env(var: &str) -> Result<PrivateKeySigner> {
    let raw = std::env::var(var).with_context(|| format!("{var} not set"))?;
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("{var} is not a valid private key"))
}

/// Shared EVM RPC provider backed by alloy-rs 0.9.
///
/// Each account (trading, treasury) gets its own provider carrying its
/// own wallet filler; adapters for the same account share one instance.
///
/// Uses `dyn Provider<Http<Client>>` for type erasure because alloy
/// 0.9's `ProviderBuilder` returns a deeply-nested generic filler type
/// that would leak implementation details. The HTTP transport stays in
/// the trait object: the filler stack only implements `Provider` over
/// the transport it was built on.
pub struct EvmProvider {
    /// The alloy HTTP provider with wallet filler (type-erased).
    provider: Arc<dyn Provider<Http<Client>> + Send + Sync>,
    /// Address derived from the wallet's signer.
    address: Address,
    /// RPC endpoint URL (for diagnostics, never logged with secrets).
    #[allow(dead_code)]
    rpc_url: String,
}

impl EvmProvider {
    /// Connect to the RPC endpoint and validate the chain ID.
    ///
    /// The URL and expected chain ID come from `config.toml` (never
    /// hardcoded); the signer comes from the environment.
    #[instrument(skip_all)]
    pub async fn connect(config: &ChainConfig, signer: PrivateKeySigner) -> Result<Self> {
        let rpc_url = config.rpc_url.clone();
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        // alloy 0.9: on_http() is synchronous, returns impl Provider
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .on_http(rpc_url.parse().context("Invalid RPC URL")?);

        let provider: Arc<dyn Provider<Http<Client>> + Send + Sync> = Arc::new(provider);

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        if chain_id != config.chain_id {
            anyhow::bail!(
                "Expected chain_id={}, got {chain_id} — check [chain] in config.toml",
                config.chain_id
            );
        }

        info!(chain_id, address = %address, "Connected to EVM RPC");

        Ok(Self {
            provider,
            address,
            rpc_url,
        })
    }

    /// Get a shared reference to the alloy provider (type-erased).
    pub fn inner(&self) -> Arc<dyn Provider<Http<Client>> + Send + Sync> {
        Arc::clone(&self.provider)
    }

    /// The wallet address this provider signs for.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Submit a prepared transaction and wait for its receipt.
    ///
    /// A mined-but-reverted transaction comes back as `Ok` with
    /// `success == false`; callers decide whether that aborts their
    /// pipeline.
    pub async fn send_prepared(
        &self,
        tx: TransactionRequest,
        label: &str,
    ) -> Result<CallOutcome> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .with_context(|| format!("Failed to submit {label} transaction"))?;

        let tx_hash = format!("{:#x}", pending.tx_hash());
        let receipt = pending
            .get_receipt()
            .await
            .with_context(|| format!("Failed to confirm {label} transaction {tx_hash}"))?;

        let gas_wei = alloy::primitives::U256::from(receipt.gas_used)
            * alloy::primitives::U256::from(receipt.effective_gas_price);

        Ok(CallOutcome {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number.unwrap_or_default(),
            gas_cost: raw_to_decimal(gas_wei, NATIVE_DECIMALS)?,
        })
    }

    /// Check if the RPC connection is healthy via a lightweight call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
