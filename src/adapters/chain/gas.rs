//! Fee Policy - EIP-1559 Fee Caps from Configuration
//!
//! Every transaction the bot submits carries the configured
//! `max_fee_per_gas` and `max_priority_fee_per_gas` caps. The node
//! charges base fee plus tip up to those ceilings; a spiking base fee
//! stalls the transaction instead of draining the wallet.

use alloy::rpc::types::TransactionRequest;

use crate::config::GasConfig;

const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// Convert a wei amount to gwei for logs and gauges.
pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI
}

/// EIP-1559 fee caps applied to every outgoing transaction.
#[derive(Debug, Clone, Copy)]
pub struct FeePolicy {
    max_fee_gwei: f64,
    max_priority_fee_gwei: f64,
}

impl FeePolicy {
    pub fn new(config: GasConfig) -> Self {
        Self {
            max_fee_gwei: config.max_fee_gwei,
            max_priority_fee_gwei: config.max_priority_fee_gwei,
        }
    }

    /// Maximum total fee per gas in wei.
    pub fn max_fee_wei(&self) -> u128 {
        (self.max_fee_gwei * WEI_PER_GWEI) as u128
    }

    /// Maximum priority fee (tip) per gas in wei.
    pub fn max_priority_fee_wei(&self) -> u128 {
        (self.max_priority_fee_gwei * WEI_PER_GWEI) as u128
    }

    /// Apply both caps to a transaction request.
    pub fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        tx.max_fee_per_gas(self.max_fee_wei())
            .max_priority_fee_per_gas(self.max_priority_fee_wei())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FeePolicy {
        FeePolicy::new(GasConfig {
            max_fee_gwei: 50.0,
            max_priority_fee_gwei: 2.0,
        })
    }

    #[test]
    fn test_caps_convert_to_wei() {
        assert_eq!(policy().max_fee_wei(), 50_000_000_000);
        assert_eq!(policy().max_priority_fee_wei(), 2_000_000_000);
    }

    #[test]
    fn test_apply_sets_both_caps() {
        let tx = policy().apply(TransactionRequest::default());
        assert_eq!(tx.max_fee_per_gas, Some(50_000_000_000));
        assert_eq!(tx.max_priority_fee_per_gas, Some(2_000_000_000));
    }

    #[test]
    fn test_wei_to_gwei() {
        assert!((wei_to_gwei(30_000_000_000) - 30.0).abs() < f64::EPSILON);
    }
}
