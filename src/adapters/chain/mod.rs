//! Chain Adapters - EVM Blockchain Interaction Layer
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - RPC provider management with a wallet-backed signer per account
//! - Balance, ownership, fulfillment and transfer calls
//! - Wrap / approve / swap against the v2 router
//! - EIP-1559 fee caps from configuration

pub mod abi;
pub mod calls;
pub mod gas;
pub mod provider;
pub mod router;

pub use calls::EvmChainClient;
pub use gas::FeePolicy;
pub use provider::EvmProvider;
pub use router::V2RouterVenue;
