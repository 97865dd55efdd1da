//! In-memory token ledger (dev mode and tests)

use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use super::{MintReceipt, TokenLedger};
use crate::game::WalletAddress;

/// A completed mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRecord {
    pub to: WalletAddress,
    pub amount: u64,
    pub tx_hash: String,
}

#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    balances: RwLock<HashMap<WalletAddress, u128>>,
    mints: RwLock<Vec<MintRecord>>,
    failing: RwLock<HashSet<WalletAddress>>,
    fail_all_mints: AtomicBool,
    balance_unavailable: AtomicBool,
    mint_latency_ms: AtomicU64,
    tx_counter: AtomicU64,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mint to `address` fail
    pub async fn fail_mints_for(&self, address: &WalletAddress) {
        self.failing.write().await.insert(address.clone());
    }

    pub fn set_fail_all_mints(&self, fail: bool) {
        self.fail_all_mints.store(fail, Ordering::SeqCst);
    }

    /// Delay every mint, like waiting for a block
    pub fn set_mint_latency(&self, latency: Duration) {
        self.mint_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_balance_unavailable(&self, unavailable: bool) {
        self.balance_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Credit tokens outside the reward path, e.g. a transfer from another wallet
    pub async fn credit(&self, address: &WalletAddress, amount: u128) {
        *self.balances.write().await.entry(address.clone()).or_insert(0) += amount;
    }

    pub async fn mints(&self) -> Vec<MintRecord> {
        self.mints.read().await.clone()
    }

    pub async fn raw_balance(&self, address: &WalletAddress) -> u128 {
        self.balances.read().await.get(address).copied().unwrap_or(0)
    }
}

impl TokenLedger for InMemoryTokenLedger {
    async fn mint(&self, to: &WalletAddress, amount: u64) -> Result<MintReceipt> {
        let latency_ms = self.mint_latency_ms.load(Ordering::SeqCst);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }

        if self.fail_all_mints.load(Ordering::SeqCst) || self.failing.read().await.contains(to) {
            bail!("Mint to {} rejected by ledger", to);
        }

        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = format!("0x{:064x}", n);

        *self.balances.write().await.entry(to.clone()).or_insert(0) += amount as u128;
        self.mints.write().await.push(MintRecord {
            to: to.clone(),
            amount,
            tx_hash: tx_hash.clone(),
        });

        info!(address = %to, amount = amount, tx_hash = %tx_hash, "Minted (in-memory)");
        Ok(MintReceipt {
            tx_hash,
            block_number: Some(n),
        })
    }

    async fn balance_of(&self, owner: &WalletAddress) -> Result<f64> {
        if self.balance_unavailable.load(Ordering::SeqCst) {
            bail!("Balance of {} unavailable", owner);
        }
        Ok(self.raw_balance(owner).await as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> WalletAddress {
        WalletAddress::parse("0x3333333333333333333333333333333333333333").unwrap()
    }

    #[tokio::test]
    async fn test_mint_and_balance() {
        let ledger = InMemoryTokenLedger::new();
        let receipt = ledger.mint(&addr(), 120).await.unwrap();
        assert!(receipt.tx_hash.starts_with("0x"));
        ledger.credit(&addr(), 5).await;
        assert_eq!(ledger.balance_of(&addr()).await.unwrap(), 125.0);
        assert_eq!(ledger.mints().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let ledger = InMemoryTokenLedger::new();
        ledger.fail_mints_for(&addr()).await;
        assert!(ledger.mint(&addr(), 1).await.is_err());
        assert_eq!(ledger.raw_balance(&addr()).await, 0);

        ledger.set_balance_unavailable(true);
        assert!(ledger.balance_of(&addr()).await.is_err());
    }
}
