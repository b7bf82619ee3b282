//! V2 Router Venue - Wrap, Approve, Swap Against a UniswapV2-style Router
//!
//! Implements the `SwapVenue` port: `getAmountsOut` quoting plus the
//! wrap / approve / swap transactions for the settlement pipeline. The
//! pair is fixed at construction (wrapped native in, reward token out)
//! and every contract address is validated to have deployed code.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::ports::chain_client::CallOutcome;
use crate::ports::swap_venue::SwapVenue;

use super::abi::{
    NATIVE_DECIMALS, address_word, calldata, decimal_to_raw, decode_last_u256_of_array,
    raw_to_decimal, selector, u256_word,
};
use super::gas::FeePolicy;
use super::provider::EvmProvider;

/// Seconds of validity given to each swap transaction.
const SWAP_DEADLINE_SECS: u64 = 300;

/// V2-style router adapter for the treasury's swap leg.
pub struct V2RouterVenue {
    /// Shared wallet-backed provider (treasury account).
    provider: Arc<EvmProvider>,
    /// EIP-1559 fee caps for submissions.
    fees: FeePolicy,
    /// Router contract.
    router: Address,
    /// Wrapped-native token (WETH9-style deposit).
    wrapped_native: Address,
    /// Reward token bought and burned by settlement.
    reward_token: Address,
    /// Reward token decimals for amount conversion.
    reward_decimals: u32,
    /// Retry attempts for the quote read.
    read_retries: u32,
    /// Delay between read retries.
    retry_delay: Duration,
}

impl V2RouterVenue {
    /// Create and validate the router bindings.
    ///
    /// Validates that the router, wrapped-native and reward token
    /// addresses all have deployed code on-chain. This prevents
    /// misconfiguration from silently failing at runtime.
    #[instrument(skip_all)]
    pub async fn new(provider: Arc<EvmProvider>, config: &AppConfig) -> Result<Self> {
        let router: Address = config
            .swap
            .router
            .parse()
            .context("Invalid router address")?;
        let wrapped_native: Address = config
            .swap
            .wrapped_native
            .parse()
            .context("Invalid wrapped-native address")?;
        let reward_token: Address = config
            .swap
            .reward_token
            .parse()
            .context("Invalid reward token address")?;

        let inner = provider.inner();
        for (name, addr) in [
            ("Router", router),
            ("Wrapped native", wrapped_native),
            ("Reward token", reward_token),
        ] {
            let code = inner
                .get_code_at(addr)
                .await
                .context(format!("Failed to query code for {name}"))?;

            if code.is_empty() {
                bail!(
                    "Contract {name} at {addr} has no deployed code; check [swap] in config.toml"
                );
            }

            info!(contract = name, address = %addr, "Validated on-chain");
        }

        Ok(Self {
            provider,
            fees: FeePolicy::new(config.gas),
            router,
            wrapped_native,
            reward_token,
            reward_decimals: config.swap.reward_token_decimals,
            read_retries: config.chain.read_retries,
            retry_delay: Duration::from_millis(config.chain.retry_delay_ms),
        })
    }

    /// Calldata for `getAmountsOut(amount_in, [wrapped, reward])`.
    fn quote_calldata(&self, amount_in: U256) -> Bytes {
        calldata(
            selector("getAmountsOut(uint256,address[])"),
            &[
                u256_word(amount_in),
                // Dynamic array: offset, then length and elements.
                u256_word(U256::from(0x40u64)),
                u256_word(U256::from(2u64)),
                address_word(self.wrapped_native),
                address_word(self.reward_token),
            ],
        )
    }

    /// Calldata for `swapExactTokensForTokens` over the fixed pair.
    fn swap_calldata(&self, amount_in: U256, min_out: U256, deadline: U256) -> Bytes {
        calldata(
            selector("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)"),
            &[
                u256_word(amount_in),
                u256_word(min_out),
                // Five head words, so the path array starts at 0xa0.
                u256_word(U256::from(0xa0u64)),
                address_word(self.provider.address()),
                u256_word(deadline),
                u256_word(U256::from(2u64)),
                address_word(self.wrapped_native),
                address_word(self.reward_token),
            ],
        )
    }
}

#[async_trait]
impl SwapVenue for V2RouterVenue {
    #[instrument(skip(self), fields(amount_in = %amount_in))]
    async fn quote_native_for_reward(&self, amount_in: Decimal) -> Result<Decimal> {
        let raw_in = decimal_to_raw(amount_in, NATIVE_DECIMALS)?;
        let tx = TransactionRequest::default()
            .to(self.router)
            .input(self.quote_calldata(raw_in).into());
        let inner = self.provider.inner();

        let mut last_err = None;
        for attempt in 1..=self.read_retries {
            match inner.call(&tx).await {
                Ok(result) => {
                    let out = decode_last_u256_of_array(&result)?;
                    return raw_to_decimal(out, self.reward_decimals);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Router quote failed");
                    last_err = Some(anyhow::Error::from(e));
                    if attempt < self.read_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| anyhow!("no attempts made"))
            .context("router quote retries exhausted"))
    }

    #[instrument(skip(self), fields(amount = %amount))]
    async fn wrap_native(&self, amount: Decimal) -> Result<CallOutcome> {
        let value = decimal_to_raw(amount, NATIVE_DECIMALS)?;
        let tx = TransactionRequest::default()
            .to(self.wrapped_native)
            .input(calldata(selector("deposit()"), &[]).into())
            .value(value);

        self.provider.send_prepared(self.fees.apply(tx), "wrap").await
    }

    #[instrument(skip(self), fields(amount = %amount))]
    async fn approve_router(&self, amount: Decimal) -> Result<CallOutcome> {
        let raw = decimal_to_raw(amount, NATIVE_DECIMALS)?;
        let data = calldata(
            selector("approve(address,uint256)"),
            &[address_word(self.router), u256_word(raw)],
        );
        let tx = TransactionRequest::default()
            .to(self.wrapped_native)
            .input(data.into());

        self.provider
            .send_prepared(self.fees.apply(tx), "approve")
            .await
    }

    #[instrument(skip(self), fields(amount_in = %amount_in, min_out = %min_out))]
    async fn swap_wrapped_for_reward(
        &self,
        amount_in: Decimal,
        min_out: Decimal,
    ) -> Result<CallOutcome> {
        let raw_in = decimal_to_raw(amount_in, NATIVE_DECIMALS)?;
        let raw_min_out = decimal_to_raw(min_out, self.reward_decimals)?;
        let deadline = U256::from(
            u64::try_from(Utc::now().timestamp()).unwrap_or_default() + SWAP_DEADLINE_SECS,
        );

        let tx = TransactionRequest::default()
            .to(self.router)
            .input(self.swap_calldata(raw_in, raw_min_out, deadline).into());

        self.provider.send_prepared(self.fees.apply(tx), "swap").await
    }

    async fn is_healthy(&self) -> bool {
        self.provider.is_healthy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_calldata_layout() {
        // 4-byte selector + 5 words: amount, offset, length, two addresses.
        let wrapped: Address = "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"
            .parse()
            .unwrap();
        let reward: Address = "0x000000000000000000000000000000000000dEaD"
            .parse()
            .unwrap();

        let data = calldata(
            selector("getAmountsOut(uint256,address[])"),
            &[
                u256_word(U256::from(7u64)),
                u256_word(U256::from(0x40u64)),
                u256_word(U256::from(2u64)),
                address_word(wrapped),
                address_word(reward),
            ],
        );

        assert_eq!(data.len(), 4 + 5 * 32);
        assert_eq!(&data[..4], &[0xd0, 0x6c, 0xa6, 0x1f]);
        // The offset word points at the length word relative to the args.
        assert_eq!(data[4 + 32 + 31], 0x40);
    }

    #[test]
    fn test_swap_selector() {
        assert_eq!(
            selector("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)"),
            [0x38, 0xed, 0x17, 0x39]
        );
    }
}
