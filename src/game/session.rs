//! Game session and wallet address types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a `0x`-prefixed 20-byte hex address
pub const ADDRESS_LEN: usize = 42;

/// Chain address in canonical form: `0x` followed by 40 lower-case hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalize an address. Mixed-case (checksummed) input is accepted.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.len() != ADDRESS_LEN {
            return Err(format!(
                "Address must be {} characters, got {}",
                ADDRESS_LEN,
                trimmed.len()
            ));
        }

        let Some(digits) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        else {
            return Err("Address must start with 0x".to_string());
        };

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("Address contains non-hex characters".to_string());
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 20 raw address bytes
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Canonical form guarantees 40 valid hex digits.
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

/// One finished game round as reported by the client.
///
/// Owned by the request; never persisted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: WalletAddress,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub bounce_count: i64,
    pub claimed_score: f64,
}

impl Session {
    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }

    /// Whole seconds survived, as recorded on the leaderboard
    pub fn survival_seconds(&self) -> i64 {
        self.duration_ms().max(0) / 1000
    }

    /// Claimed score rounded down to whole points
    pub fn floored_score(&self) -> i64 {
        floor_points(self.claimed_score)
    }
}

/// Floor a score to whole points, mapping negative and non-finite values to 0
pub fn floor_points(score: f64) -> i64 {
    if !score.is_finite() || score <= 0.0 {
        return 0;
    }
    score.floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let addr = WalletAddress::parse("0xAbCdEf0123456789aBcDeF0123456789AbCdEf01").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(addr.to_bytes()[0], 0xab);
        assert_eq!(addr.to_bytes()[19], 0x01);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(WalletAddress::parse("").is_err());
        assert!(WalletAddress::parse("0x1234").is_err());
        assert!(WalletAddress::parse("1xabcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(WalletAddress::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let addr: WalletAddress =
            serde_json::from_str("\"0xABCDEF0123456789ABCDEF0123456789ABCDEF01\"").unwrap();
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"0xabcdef0123456789abcdef0123456789abcdef01\""
        );
        assert!(serde_json::from_str::<WalletAddress>("\"0x12\"").is_err());
    }

    #[test]
    fn test_session_durations() {
        let session = Session {
            user_id: WalletAddress::parse("0x00000000000000000000000000000000000000aa").unwrap(),
            start_time_ms: 1_000,
            end_time_ms: 11_999,
            bounce_count: 3,
            claimed_score: 3.3,
        };
        assert_eq!(session.duration_ms(), 10_999);
        assert_eq!(session.survival_seconds(), 10);
        assert_eq!(session.floored_score(), 3);
    }

    #[test]
    fn test_floor_points() {
        assert_eq!(floor_points(13.2068), 13);
        assert_eq!(floor_points(-4.0), 0);
        assert_eq!(floor_points(f64::NAN), 0);
    }
}
