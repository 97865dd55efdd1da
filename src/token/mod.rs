//! PONG Token Integration
//!
//! The reward token lives on chain; this module is the only path to it. Minting
//! is irreversible, so callers must treat a successful [`TokenLedger::mint`] as
//! committed before touching any local state.
//!
//! ## Backends
//!
//! - [`RpcTokenClient`]: Ethereum JSON-RPC, waits for the transaction receipt
//! - [`InMemoryTokenLedger`]: process-local balances for development and tests

pub mod abi;
pub mod client;
pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::game::WalletAddress;

pub use client::{RpcTokenClient, TokenClientConfig};
pub use memory::InMemoryTokenLedger;

/// Confirmation of an included mint transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Mint and balance operations of the reward token
pub trait TokenLedger: Send + Sync + 'static {
    /// Mint `amount` whole points to `to`. Returns only once the transaction is
    /// included; any error means nothing was minted.
    fn mint(
        &self,
        to: &WalletAddress,
        amount: u64,
    ) -> impl Future<Output = Result<MintReceipt>> + Send;

    /// Current balance in token units
    fn balance_of(&self, owner: &WalletAddress) -> impl Future<Output = Result<f64>> + Send;
}
