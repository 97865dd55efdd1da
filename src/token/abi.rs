//! Minimal ABI encoding for the reward token calls
//!
//! Only static arguments are needed: every argument is one 32-byte big-endian
//! word following the 4-byte function selector.

use anyhow::{Result, bail};
use sha3::{Digest, Keccak256};

use crate::game::WalletAddress;

pub const REWARD_SIGNATURE: &str = "reward(address,uint256)";
pub const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";
pub const DECIMALS_SIGNATURE: &str = "decimals()";

pub type Word = [u8; 32];

/// First four bytes of the Keccak-256 hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn address_word(address: &WalletAddress) -> Word {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address.to_bytes());
    word
}

pub fn uint_word(value: u128) -> Word {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// `0x`-prefixed calldata for a call with static arguments
pub fn encode_call(signature: &str, words: &[Word]) -> String {
    let mut data = Vec::with_capacity(4 + 32 * words.len());
    data.extend_from_slice(&selector(signature));
    for word in words {
        data.extend_from_slice(word);
    }
    format!("0x{}", hex::encode(data))
}

pub fn reward_call(to: &WalletAddress, amount: u64) -> String {
    encode_call(REWARD_SIGNATURE, &[address_word(to), uint_word(amount as u128)])
}

pub fn balance_of_call(owner: &WalletAddress) -> String {
    encode_call(BALANCE_OF_SIGNATURE, &[address_word(owner)])
}

pub fn decimals_call() -> String {
    encode_call(DECIMALS_SIGNATURE, &[])
}

/// Decode a hex quantity or uint256 return word
pub fn decode_uint(raw: &str) -> Result<u128> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let significant = digits.trim_start_matches('0');

    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 32 {
        bail!("Value {} does not fit in 128 bits", raw);
    }
    Ok(u128::from_str_radix(significant, 16)?)
}

/// Convert raw base units to token units
pub fn scale_units(raw: u128, decimals: u32) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(selector(BALANCE_OF_SIGNATURE), [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(selector(DECIMALS_SIGNATURE), [0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_balance_of_calldata() {
        let owner = WalletAddress::parse("0x00000000000000000000000000000000000000ff").unwrap();
        let data = balance_of_call(&owner);
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x70a08231"));
        assert!(data.ends_with("ff"));
    }

    #[test]
    fn test_reward_calldata_layout() {
        let to = WalletAddress::parse("0x1234567890abcdef1234567890abcdef12345678").unwrap();
        let data = reward_call(&to, 500);
        let body = &data[10..];
        assert_eq!(&body[..24], "0".repeat(24));
        assert_eq!(&body[24..64], "1234567890abcdef1234567890abcdef12345678");
        assert_eq!(&body[64..], format!("{:064x}", 500));
    }

    #[test]
    fn test_decode_uint() {
        assert_eq!(decode_uint("0x0").unwrap(), 0);
        assert_eq!(decode_uint("0x12").unwrap(), 18);
        assert_eq!(decode_uint(&format!("0x{:064x}", 1_000u128)).unwrap(), 1_000);
        assert!(decode_uint(&format!("0x1{}", "0".repeat(32))).is_err());
        assert!(decode_uint("0xzz").is_err());
    }

    #[test]
    fn test_scale_units() {
        assert_eq!(scale_units(1_500, 3), 1.5);
        assert_eq!(scale_units(42, 0), 42.0);
    }
}
