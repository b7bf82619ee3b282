//! EVM Chain Client - Balances, Ownership, Fulfillment, Transfers
//!
//! Implements the `ChainClient` port for one signing account via
//! alloy-rs 0.9. Contract reads go through raw `eth_call` with
//! hand-encoded calldata and retry on transport errors; submissions
//! carry the configured EIP-1559 fee caps and wait for their receipts.

use std::collections::HashMap;
use std::time::Duration;

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{instrument, warn};

use crate::config::AppConfig;
use crate::domain::flywheel::{FulfillmentCall, TokenId};
use crate::ports::chain_client::{CallOutcome, ChainClient};

use super::abi::{
    NATIVE_DECIMALS, address_word, calldata, decimal_to_raw, decode_address, decode_u256,
    raw_to_decimal, selector, u256_word,
};
use super::gas::{FeePolicy, wei_to_gwei};
use super::provider::EvmProvider;

/// Implements on-chain reads and writes for one signing account.
pub struct EvmChainClient {
    /// Shared wallet-backed provider.
    provider: Arc<EvmProvider>,
    /// EIP-1559 fee caps for submissions.
    fees: FeePolicy,
    /// Retry attempts for reads, from `[chain]` config.
    read_retries: u32,
    /// Delay between read retries.
    retry_delay: Duration,
    /// This account's address, precomputed for the port.
    address_text: String,
    /// Known token decimals, keyed by lowercase address. Unlisted
    /// tokens are assumed 18.
    token_decimals: HashMap<String, u32>,
}

impl EvmChainClient {
    pub fn new(provider: Arc<EvmProvider>, config: &AppConfig) -> Self {
        let mut token_decimals = HashMap::new();
        token_decimals.insert(config.swap.wrapped_native.to_lowercase(), NATIVE_DECIMALS);
        token_decimals.insert(
            config.swap.reward_token.to_lowercase(),
            config.swap.reward_token_decimals,
        );

        let address_text = provider.address().to_string();
        Self {
            provider,
            fees: FeePolicy::new(config.gas),
            read_retries: config.chain.read_retries,
            retry_delay: Duration::from_millis(config.chain.retry_delay_ms),
            address_text,
            token_decimals,
        }
    }

    fn decimals_for(&self, token: &str) -> u32 {
        self.token_decimals
            .get(&token.to_lowercase())
            .copied()
            .unwrap_or(NATIVE_DECIMALS)
    }

    /// Raw `eth_call` with the configured read retry policy.
    async fn read_call(&self, to: Address, data: Bytes, label: &'static str) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        let inner = self.provider.inner();

        let mut last_err = None;
        for attempt in 1..=self.read_retries {
            match inner.call(&tx).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(attempt, label, error = %e, "Contract read failed");
                    last_err = Some(anyhow::Error::from(e));
                    if attempt < self.read_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| anyhow!("no attempts made"))
            .context(format!("{label} read retries exhausted")))
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn address(&self) -> &str {
        &self.address_text
    }

    #[instrument(skip(self))]
    async fn native_balance(&self, address: &str) -> Result<Decimal> {
        let addr: Address = address.parse().context("Invalid address")?;
        let inner = self.provider.inner();

        let mut last_err = None;
        for attempt in 1..=self.read_retries {
            match inner.get_balance(addr).await {
                Ok(wei) => return raw_to_decimal(wei, NATIVE_DECIMALS),
                Err(e) => {
                    warn!(attempt, error = %e, "Balance read failed");
                    last_err = Some(anyhow::Error::from(e));
                    if attempt < self.read_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| anyhow!("no attempts made"))
            .context("balance read retries exhausted"))
    }

    #[instrument(skip(self))]
    async fn erc20_balance(&self, token: &str, owner: &str) -> Result<Decimal> {
        let token_addr: Address = token.parse().context("Invalid token address")?;
        let owner_addr: Address = owner.parse().context("Invalid owner address")?;

        let data = calldata(selector("balanceOf(address)"), &[address_word(owner_addr)]);

        let result = self.read_call(token_addr, data, "erc20_balance").await?;
        raw_to_decimal(decode_u256(&result)?, self.decimals_for(token))
    }

    #[instrument(skip(self), fields(token_id = %token_id))]
    async fn nft_owner(&self, collection: &str, token_id: &TokenId) -> Result<String> {
        let collection_addr: Address = collection.parse().context("Invalid collection address")?;
        let id: U256 = token_id
            .parse()
            .with_context(|| format!("Invalid token id {token_id}"))?;

        let data = calldata(selector("ownerOf(uint256)"), &[u256_word(id)]);

        let result = self.read_call(collection_addr, data, "nft_owner").await?;
        Ok(decode_address(&result)?.to_string())
    }

    #[instrument(skip(self, call), fields(to = %call.to))]
    async fn submit_fulfillment(&self, call: &FulfillmentCall) -> Result<CallOutcome> {
        let to: Address = call.to.parse().context("Invalid fulfillment target")?;
        let data: Bytes = call.data.parse().context("Invalid fulfillment calldata")?;
        let value = decimal_to_raw(call.value, NATIVE_DECIMALS)?;

        let tx = TransactionRequest::default()
            .to(to)
            .input(data.into())
            .value(value);

        self.provider
            .send_prepared(self.fees.apply(tx), "fulfillment")
            .await
    }

    #[instrument(skip(self), fields(to = %to, amount = %amount))]
    async fn transfer_native(&self, to: &str, amount: Decimal) -> Result<CallOutcome> {
        let to_addr: Address = to.parse().context("Invalid transfer target")?;
        let value = decimal_to_raw(amount, NATIVE_DECIMALS)?;

        let tx = TransactionRequest::default().to(to_addr).value(value);

        self.provider
            .send_prepared(self.fees.apply(tx), "native transfer")
            .await
    }

    #[instrument(skip(self), fields(token = %token, to = %to, amount = %amount))]
    async fn transfer_erc20(&self, token: &str, to: &str, amount: Decimal) -> Result<CallOutcome> {
        let token_addr: Address = token.parse().context("Invalid token address")?;
        let to_addr: Address = to.parse().context("Invalid transfer target")?;
        let raw = decimal_to_raw(amount, self.decimals_for(token))?;

        let data = calldata(
            selector("transfer(address,uint256)"),
            &[address_word(to_addr), u256_word(raw)],
        );

        let tx = TransactionRequest::default()
            .to(token_addr)
            .input(data.into());

        self.provider
            .send_prepared(self.fees.apply(tx), "erc20 transfer")
            .await
    }

    #[instrument(skip(self))]
    async fn gas_price_gwei(&self) -> Result<f64> {
        let wei = self
            .provider
            .inner()
            .get_gas_price()
            .await
            .context("Failed to query gas price")?;
        Ok(wei_to_gwei(wei))
    }

    async fn is_healthy(&self) -> bool {
        self.provider.is_healthy().await
    }
}
