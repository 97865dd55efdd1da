//! Token RPC Client
//!
//! Talks to an Ethereum JSON-RPC node. Mint transactions are sent from a minter
//! account whose key is held by the node's signer, then polled until a receipt
//! shows inclusion.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::abi;
use super::{MintReceipt, TokenLedger};
use crate::game::WalletAddress;

#[derive(Debug, Clone)]
pub struct TokenClientConfig {
    pub rpc_url: String,
    pub token_address: WalletAddress,
    /// Account holding the token's minter role
    pub minter_address: WalletAddress,
    pub request_timeout_secs: u64,
    /// How long to wait for a mint to be included
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    status: Option<String>,
    block_number: Option<String>,
}

pub struct RpcTokenClient {
    http: Client,
    config: TokenClientConfig,
    next_id: AtomicU64,
    decimals: OnceCell<u32>,
}

impl RpcTokenClient {
    pub fn new(config: TokenClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("PongOracle/0.1 (Token RPC)")
            .build()
            .context("Failed to create RPC HTTP client")?;

        info!(
            token = %config.token_address,
            minter = %config.minter_address,
            "Token RPC client created"
        );

        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
            decimals: OnceCell::new(),
        })
    }

    /// Issue one JSON-RPC call. `Ok(None)` is a successful call with a null result.
    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .http
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("RPC request {} failed", method))?
            .error_for_status()
            .with_context(|| format!("RPC request {} rejected", method))?
            .json()
            .await
            .with_context(|| format!("Invalid RPC response for {}", method))?;

        if let Some(error) = response.error {
            bail!("{} failed: {} (code {})", method, error.message, error.code);
        }

        Ok(response.result)
    }

    async fn call_token(&self, data: String) -> Result<u128> {
        let raw: String = self
            .rpc(
                "eth_call",
                json!([{ "to": self.config.token_address.as_str(), "data": data }, "latest"]),
            )
            .await?
            .ok_or_else(|| anyhow!("eth_call returned no data"))?;

        abi::decode_uint(&raw)
    }

    /// Token decimals, fetched once
    async fn decimals(&self) -> Result<u32> {
        let decimals = self
            .decimals
            .get_or_try_init(|| async {
                let raw = self.call_token(abi::decimals_call()).await?;
                u32::try_from(raw).context("Token decimals out of range")
            })
            .await?;
        Ok(*decimals)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + Duration::from_secs(self.config.confirmation_timeout_secs);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if let Some(receipt) = self
                .rpc::<TransactionReceipt>("eth_getTransactionReceipt", json!([tx_hash]))
                .await?
            {
                return Ok(receipt);
            }

            if Instant::now() >= deadline {
                bail!(
                    "Transaction {} not confirmed within {}s",
                    tx_hash,
                    self.config.confirmation_timeout_secs
                );
            }

            debug!(tx_hash = %tx_hash, "Waiting for mint confirmation");
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl TokenLedger for RpcTokenClient {
    async fn mint(&self, to: &WalletAddress, amount: u64) -> Result<MintReceipt> {
        info!(address = %to, amount = amount, "Rewarding player");

        let tx_hash: String = self
            .rpc(
                "eth_sendTransaction",
                json!([{
                    "from": self.config.minter_address.as_str(),
                    "to": self.config.token_address.as_str(),
                    "data": abi::reward_call(to, amount),
                }]),
            )
            .await?
            .ok_or_else(|| anyhow!("eth_sendTransaction returned no hash"))?;

        let receipt = self.wait_for_receipt(&tx_hash).await?;

        if receipt.status.as_deref() != Some("0x1") {
            warn!(tx_hash = %tx_hash, status = ?receipt.status, "Mint transaction reverted");
            bail!("Mint transaction {} reverted", tx_hash);
        }

        let block_number = receipt
            .block_number
            .as_deref()
            .and_then(|raw| abi::decode_uint(raw).ok())
            .and_then(|n| u64::try_from(n).ok());

        info!(tx_hash = %tx_hash, address = %to, amount = amount, "Reward transaction confirmed");

        Ok(MintReceipt {
            tx_hash,
            block_number,
        })
    }

    async fn balance_of(&self, owner: &WalletAddress) -> Result<f64> {
        let raw = self.call_token(abi::balance_of_call(owner)).await?;
        let decimals = self.decimals().await?;
        let balance = abi::scale_units(raw, decimals);

        debug!(address = %owner, balance = balance, "Read token balance");
        Ok(balance)
    }
}
