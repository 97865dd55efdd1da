use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::warn;
use url::Url;

use crate::game::{MultiplierCurve, ValidationLimits, WalletAddress};
use crate::rewards::SettlementPolicy;
use crate::token::TokenClientConfig;

/// Configuration for the PONG reward oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Token chain configuration
    pub chain: ChainConfig,
    /// Anti-cheat and reward rules
    pub scoring: ScoringConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Referral links
    pub referral: ReferralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require HTTPS for all external communications
    pub require_https: bool,
    /// Enable API key authentication of the wallet-session gateway
    pub enable_auth: bool,
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, uses in-memory fallback)
    pub postgres_enabled: bool,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Mint through the JSON-RPC node (if false, uses in-memory ledger)
    pub enabled: bool,
    /// Node JSON-RPC endpoint
    pub rpc_url: String,
    /// PONG token contract address
    pub token_address: String,
    /// Node-managed account allowed to mint
    pub minter_address: String,
    pub request_timeout_secs: u64,
    /// How long to wait for a mint receipt
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Per-bounce multiplier growth
    pub growth_rate: f64,
    /// Upper bound of the per-bounce multiplier, unbounded if unset
    pub multiplier_cap: Option<f64>,
    pub max_bounces_per_second: f64,
    /// Oldest accepted session end, relative to now
    pub max_staleness_ms: i64,
    pub max_clock_skew_ms: i64,
    /// Scores below `threshold - 1` earn no reward
    pub minimum_score_threshold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
    /// Enable log sanitization to prevent sensitive data exposure
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Page the referral link points at
    pub base_url: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let limits = ValidationLimits::default();
        let policy = SettlementPolicy::default();
        Self {
            growth_rate: crate::game::score::DEFAULT_GROWTH_RATE,
            multiplier_cap: None,
            max_bounces_per_second: limits.max_bounces_per_second,
            max_staleness_ms: limits.max_staleness_ms,
            max_clock_skew_ms: limits.max_clock_skew_ms,
            minimum_score_threshold: policy.minimum_score_threshold,
        }
    }
}

impl ScoringConfig {
    pub fn curve(&self) -> MultiplierCurve {
        MultiplierCurve::new(self.growth_rate, self.multiplier_cap)
    }

    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_bounces_per_second: self.max_bounces_per_second,
            max_staleness_ms: self.max_staleness_ms,
            max_clock_skew_ms: self.max_clock_skew_ms,
        }
    }

    pub fn policy(&self) -> SettlementPolicy {
        SettlementPolicy {
            minimum_score_threshold: self.minimum_score_threshold,
            ..SettlementPolicy::default()
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "https://rpc.huddle01.com".to_string(),
            token_address: String::new(), // Must be set when the chain is enabled
            minter_address: String::new(),
            request_timeout_secs: 30,
            confirmation_timeout_secs: 120,
            poll_interval_ms: 1000,
        }
    }
}

impl ChainConfig {
    /// Convert to the RPC client configuration
    pub fn to_client_config(&self) -> Result<TokenClientConfig> {
        let token_address = WalletAddress::parse(&self.token_address)
            .map_err(|e| anyhow::anyhow!("Invalid token address: {}", e))?;
        let minter_address = WalletAddress::parse(&self.minter_address)
            .map_err(|e| anyhow::anyhow!("Invalid minter address: {}", e))?;

        Ok(TokenClientConfig {
            rpc_url: self.rpc_url.clone(),
            token_address,
            minter_address,
            request_timeout_secs: self.request_timeout_secs,
            confirmation_timeout_secs: self.confirmation_timeout_secs,
            poll_interval_ms: self.poll_interval_ms,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/pong".to_string(),
            postgres_enabled: false,
            max_connections: 10,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8765,
            },
            security: SecurityConfig {
                require_https: true,
                enable_auth: true,
                rate_limit_per_minute: 60,
                max_request_size: 64 * 1024, // 64KB
            },
            database: DatabaseConfig::default(),
            chain: ChainConfig::default(),
            scoring: ScoringConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false, // Disabled by default for security
            },
            referral: ReferralConfig {
                base_url: "https://pong.huddle01.com".to_string(),
            },
        }
    }
}

/// Parse an optional environment variable, reporting the variable name on failure
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {} value", name))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

impl OracleConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("PONG_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_parse("PONG_PORT")? {
            config.server.port = port;
        }

        // Security configuration
        if let Some(require_https) = env_parse("PONG_REQUIRE_HTTPS")? {
            config.security.require_https = require_https;
        }
        if let Some(enable_auth) = env_parse("PONG_ENABLE_AUTH")? {
            config.security.enable_auth = enable_auth;
        }
        if let Some(rate_limit) = env_parse("PONG_RATE_LIMIT_PER_MINUTE")? {
            config.security.rate_limit_per_minute = rate_limit;
        }
        if let Some(max_size) = env_parse("PONG_MAX_REQUEST_SIZE")? {
            config.security.max_request_size = max_size;
        }

        // Database configuration
        if let Ok(url) = env::var("PONG_POSTGRES_URL") {
            config.database.postgres_url = url;
        }
        if let Some(enabled) = env_parse("PONG_POSTGRES_ENABLED")? {
            config.database.postgres_enabled = enabled;
        }
        if let Some(max) = env_parse("PONG_POSTGRES_MAX_CONNECTIONS")? {
            config.database.max_connections = max;
        }

        // Chain configuration
        if let Some(enabled) = env_parse("PONG_CHAIN_ENABLED")? {
            config.chain.enabled = enabled;
        }
        if let Ok(rpc_url) = env::var("PONG_RPC_URL") {
            config.chain.rpc_url = rpc_url;
        }
        if let Ok(token) = env::var("PONG_TOKEN_ADDRESS") {
            config.chain.token_address = token;
        }
        if let Ok(minter) = env::var("PONG_MINTER_ADDRESS") {
            config.chain.minter_address = minter;
        }
        if let Some(timeout) = env_parse("PONG_RPC_TIMEOUT_SECS")? {
            config.chain.request_timeout_secs = timeout;
        }
        if let Some(timeout) = env_parse("PONG_CONFIRMATION_TIMEOUT_SECS")? {
            config.chain.confirmation_timeout_secs = timeout;
        }
        if let Some(interval) = env_parse("PONG_RECEIPT_POLL_INTERVAL_MS")? {
            config.chain.poll_interval_ms = interval;
        }

        // Scoring configuration
        if let Some(rate) = env_parse("PONG_MULTIPLIER_GROWTH_RATE")? {
            config.scoring.growth_rate = rate;
        }
        if let Some(cap) = env_parse("PONG_MULTIPLIER_CAP")? {
            config.scoring.multiplier_cap = Some(cap);
        }
        if let Some(rate) = env_parse("PONG_MAX_BOUNCES_PER_SECOND")? {
            config.scoring.max_bounces_per_second = rate;
        }
        if let Some(staleness) = env_parse("PONG_MAX_STALENESS_MS")? {
            config.scoring.max_staleness_ms = staleness;
        }
        if let Some(skew) = env_parse("PONG_MAX_CLOCK_SKEW_MS")? {
            config.scoring.max_clock_skew_ms = skew;
        }
        if let Some(threshold) = env_parse("PONG_MINIMUM_SCORE_THRESHOLD")? {
            config.scoring.minimum_score_threshold = threshold;
        }

        // Logging configuration
        if let Ok(log_level) = env::var("PONG_LOG_LEVEL") {
            config.logging.level = log_level;
        }
        if let Some(sanitize_logs) = env_parse("PONG_SANITIZE_LOGS")? {
            config.logging.sanitize_logs = sanitize_logs;
        }
        if let Some(log_requests) = env_parse("PONG_LOG_REQUESTS")? {
            config.logging.log_requests = log_requests;
        }

        // Referral configuration
        if let Ok(base_url) = env::var("PONG_REFERRAL_BASE_URL") {
            config.referral.base_url = base_url;
        }

        if !config.chain.enabled {
            warn!("PONG_CHAIN_ENABLED is not set, rewards are minted to an in-memory ledger");
        }

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        // Validate server configuration
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        // Validate scoring rules
        let scoring = &self.scoring;
        if !scoring.growth_rate.is_finite() || scoring.growth_rate < 0.0 {
            return Err(anyhow::anyhow!(
                "Multiplier growth rate must be a non-negative number, got {}",
                scoring.growth_rate
            ));
        }

        if let Some(cap) = scoring.multiplier_cap
            && (cap.is_nan() || cap < 1.0)
        {
            return Err(anyhow::anyhow!(
                "Multiplier cap must be at least 1, got {}",
                cap
            ));
        }

        if !scoring.max_bounces_per_second.is_finite() || scoring.max_bounces_per_second <= 0.0 {
            return Err(anyhow::anyhow!("Max bounces per second must be positive"));
        }

        if scoring.max_staleness_ms <= 0 {
            return Err(anyhow::anyhow!("Max staleness window must be positive"));
        }

        if scoring.max_clock_skew_ms < 0 {
            return Err(anyhow::anyhow!("Max clock skew cannot be negative"));
        }

        // Validate referral link base
        Url::parse(&self.referral.base_url).with_context(|| {
            format!("Invalid referral base URL: {}", self.referral.base_url)
        })?;

        // Validate chain configuration
        if self.chain.enabled {
            let rpc = Url::parse(&self.chain.rpc_url)
                .with_context(|| format!("Invalid RPC URL: {}", sanitize_url(&self.chain.rpc_url)))?;

            if self.security.require_https && rpc.scheme() != "https" {
                return Err(anyhow::anyhow!(
                    "HTTPS is required but RPC URL is not HTTPS: {}",
                    sanitize_url(&self.chain.rpc_url)
                ));
            }

            self.chain.to_client_config()?;

            if self.chain.poll_interval_ms == 0 {
                return Err(anyhow::anyhow!("Receipt poll interval must be non-zero"));
            }
        }

        if self.database.postgres_enabled && self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("PostgreSQL pool needs at least one connection"));
        }

        Ok(())
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    // Common patterns for sensitive data
    let sensitive_patterns = [
        "auth",
        "key",
        "token",
        "password",
        "secret",
        "credential",
        "api_key",
        "apikey",
    ];

    let data_lower = data.to_lowercase();
    for pattern in &sensitive_patterns {
        if data_lower.contains(pattern) {
            // For very long strings, show more context but mask the middle
            if data.len() > 20 {
                return format!("{}***{}", &data[..6], &data[data.len().saturating_sub(6)..]);
            } else {
                return format!(
                    "{}***{}",
                    &data[..data.len().min(2)],
                    &data[data.len().saturating_sub(2)..]
                );
            }
        }
    }

    data.to_string()
}

/// Strip credentials and path from a URL (RPC providers embed API keys in both)
pub fn sanitize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => format!("{}://{}/***", url.scheme(), host),
            None => "***".to_string(),
        },
        Err(_) => sanitize_for_logging(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_config() -> OracleConfig {
        let mut config = OracleConfig::default();
        config.chain.enabled = true;
        config.chain.token_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string();
        config.chain.minter_address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string();
        config
    }

    #[test]
    fn test_sanitize_for_logging() {
        // For strings <= 20 chars with sensitive pattern, show first 2 and last 2
        assert_eq!(sanitize_for_logging("api_key_secret"), "ap***et");
        assert_eq!(sanitize_for_logging("normal_data"), "normal_data");
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url("https://user:pw@eth.example.com/v3/abcdef"),
            "https://eth.example.com/***"
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(OracleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_scoring_defaults() {
        let scoring = ScoringConfig::default();
        assert_eq!(scoring.growth_rate, 0.05);
        assert_eq!(scoring.multiplier_cap, None);
        assert_eq!(scoring.max_bounces_per_second, 5.0);
        assert_eq!(scoring.max_staleness_ms, 60_000);
        assert_eq!(scoring.policy().minimum_score_threshold, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = OracleConfig::default();
        config.scoring.growth_rate = -0.1;
        assert!(config.validate().is_err());

        let mut config = OracleConfig::default();
        config.scoring.multiplier_cap = Some(0.5);
        assert!(config.validate().is_err());

        let mut config = OracleConfig::default();
        config.scoring.max_staleness_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chain_validation() {
        assert!(chain_config().validate().is_ok());

        let mut config = chain_config();
        config.chain.rpc_url = "http://localhost:8545".to_string();
        assert!(config.validate().is_err());
        config.security.require_https = false;
        assert!(config.validate().is_ok());

        let mut config = chain_config();
        config.chain.minter_address = "0x1234".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_normalizes_addresses() {
        let client = chain_config().chain.to_client_config().unwrap();
        assert_eq!(
            client.token_address.as_str(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }
}
