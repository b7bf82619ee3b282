//! ABI Helpers - Raw Calldata Encoding and Decimal Conversion
//!
//! Hand-rolled encoding for the handful of fixed contract calls the bot
//! makes (ERC-20, ERC-721 ownerOf, WETH deposit, v2 router). Selectors
//! are `keccak256(signature)[..4]`, arguments are 32-byte words.
//!
//! All amounts cross this boundary as `Decimal`; raw token units exist
//! only inside the chain adapters.

use alloy::primitives::{Address, Bytes, U256, keccak256};
use anyhow::{Context, Result, anyhow};
use rust_decimal::Decimal;

/// Native token decimals (wei per whole unit).
pub const NATIVE_DECIMALS: u32 = 18;

/// First four bytes of the keccak-256 hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// An address left-padded to a 32-byte ABI word.
pub fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

/// A U256 as a big-endian 32-byte ABI word.
pub fn u256_word(value: U256) -> [u8; 32] {
    value.to_be_bytes()
}

/// Assemble calldata from a selector and argument words.
pub fn calldata(selector: [u8; 4], words: &[[u8; 32]]) -> Bytes {
    let mut data = Vec::with_capacity(4 + 32 * words.len());
    data.extend_from_slice(&selector);
    for word in words {
        data.extend_from_slice(word);
    }
    Bytes::from(data)
}

/// Decode a single uint256 return word.
pub fn decode_u256(data: &[u8]) -> Result<U256> {
    anyhow::ensure!(
        data.len() >= 32,
        "expected a 32-byte return word, got {} bytes",
        data.len()
    );
    Ok(U256::from_be_slice(&data[..32]))
}

/// Decode a single address return word.
pub fn decode_address(data: &[u8]) -> Result<Address> {
    anyhow::ensure!(
        data.len() >= 32,
        "expected a 32-byte return word, got {} bytes",
        data.len()
    );
    Ok(Address::from_slice(&data[12..32]))
}

/// Decode the final element of a returned `uint256[]`.
///
/// The v2 router's `getAmountsOut` returns one amount per hop; the last
/// element is the output amount.
pub fn decode_last_u256_of_array(data: &[u8]) -> Result<U256> {
    anyhow::ensure!(
        data.len() >= 64,
        "expected array return data, got {} bytes",
        data.len()
    );
    let len = usize::try_from(U256::from_be_slice(&data[32..64]))
        .map_err(|_| anyhow!("array length word out of range"))?;
    anyhow::ensure!(len > 0, "router returned an empty amounts array");
    let start = 64 + 32 * (len - 1);
    anyhow::ensure!(
        data.len() >= start + 32,
        "array return data truncated ({} bytes for {len} elements)",
        data.len()
    );
    Ok(U256::from_be_slice(&data[start..start + 32]))
}

/// Convert raw token units to a `Decimal` amount.
///
/// `Decimal` mantissas are 96-bit; balances beyond that (possible for
/// high-supply ERC-20s) surface as an error instead of a panic.
pub fn raw_to_decimal(raw: U256, decimals: u32) -> Result<Decimal> {
    let units =
        i128::try_from(raw).map_err(|_| anyhow!("amount {raw} overflows decimal range"))?;
    let amount = Decimal::try_from_i128_with_scale(units, decimals)
        .map_err(|_| anyhow!("amount {raw} overflows decimal range"))?;
    Ok(amount.normalize())
}

/// Convert a `Decimal` amount to raw token units.
pub fn decimal_to_raw(amount: Decimal, decimals: u32) -> Result<U256> {
    anyhow::ensure!(
        amount >= Decimal::ZERO,
        "amount must be non-negative, got {amount}"
    );
    let mut scaled = amount;
    scaled.rescale(decimals);
    anyhow::ensure!(
        scaled.scale() == decimals,
        "amount {amount} does not fit a {decimals}-decimal encoding"
    );
    let units = u128::try_from(scaled.mantissa())
        .with_context(|| format!("amount {amount} overflows raw encoding"))?;
    Ok(U256::from(units))
}
