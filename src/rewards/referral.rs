//! Referral relationships and statistics

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::database::{GameStore, InsertOutcome};
use crate::game::WalletAddress;

/// Result of a referral submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReferralOutcome {
    fn accepted() -> Self {
        Self {
            success: true,
            message: Some("Referral added successfully".to_string()),
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
        }
    }

    /// Lost a race against a concurrent submission for the same referee
    fn silently_rejected() -> Self {
        Self {
            success: false,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub total_referrals: i64,
    pub successful_referrals: i64,
    pub pending_referrals: i64,
    pub referral_link: String,
    pub can_share_referral: bool,
}

/// Records who referred whom and reports referral progress
pub struct ReferralLedger<S> {
    store: Arc<S>,
    base_url: String,
}

impl<S: GameStore> ReferralLedger<S> {
    pub fn new(store: Arc<S>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
        }
    }

    /// Shareable link carrying the player's address as referral code
    pub fn referral_link(&self, address: &WalletAddress) -> String {
        format!("{}?ref={}", self.base_url.trim_end_matches('/'), address)
    }

    /// Attribute `referee` to `referrer`. First write wins.
    pub async fn add_referral(
        &self,
        referrer: &WalletAddress,
        referee: &WalletAddress,
    ) -> ReferralOutcome {
        if referrer == referee {
            return ReferralOutcome::rejected("Cannot refer yourself");
        }

        match self.store.leaderboard_entry(referrer).await {
            Ok(Some(_)) => {}
            Ok(None) => return ReferralOutcome::rejected("Invalid referrer address"),
            Err(e) => {
                error!(referrer = %referrer, error = %e, "Failed to look up referrer");
                return ReferralOutcome::rejected("Failed to add referral");
            }
        }

        match self.store.referral_for_referee(referee).await {
            Ok(None) => {}
            Ok(Some(_)) => return ReferralOutcome::rejected("Referral already exists"),
            Err(e) => {
                error!(referee = %referee, error = %e, "Failed to look up referral");
                return ReferralOutcome::rejected("Failed to add referral");
            }
        }

        match self.store.leaderboard_entry(referee).await {
            Ok(Some(entry)) if entry.first_game.is_played() => {
                return ReferralOutcome::rejected("User has already played their first game");
            }
            Ok(_) => {}
            Err(e) => {
                error!(referee = %referee, error = %e, "Failed to look up referee");
                return ReferralOutcome::rejected("Failed to add referral");
            }
        }

        match self.store.insert_referral(referrer, referee).await {
            Ok(InsertOutcome::Inserted(record)) => {
                info!(
                    referrer = %referrer,
                    referee = %referee,
                    id = %record.id,
                    "Referral added"
                );
                ReferralOutcome::accepted()
            }
            Ok(InsertOutcome::Conflict) => {
                debug!(referee = %referee, "Concurrent referral insert lost the race");
                ReferralOutcome::silently_rejected()
            }
            Err(e) => {
                error!(referrer = %referrer, referee = %referee, error = %e, "Failed to add referral");
                ReferralOutcome::rejected("Failed to add referral")
            }
        }
    }

    pub async fn stats(&self, address: &WalletAddress) -> Result<ReferralStats, String> {
        let records = self.store.referrals_by_referrer(address).await?;
        let entry = self.store.leaderboard_entry(address).await?;

        let total = records.len() as i64;
        let successful = records
            .iter()
            .filter(|record| record.first_game.is_played())
            .count() as i64;

        Ok(ReferralStats {
            total_referrals: total,
            successful_referrals: successful,
            pending_referrals: total - successful,
            referral_link: self.referral_link(address),
            can_share_referral: entry.is_some_and(|entry| entry.first_game.is_played()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{LeaderboardUpdate, MemoryGameStore};

    fn addr(c: char) -> WalletAddress {
        WalletAddress::parse(&format!("0x{}", c.to_string().repeat(40))).unwrap()
    }

    async fn played(store: &MemoryGameStore, address: &WalletAddress) {
        store
            .upsert_leaderboard(&LeaderboardUpdate {
                wallet_address: address.clone(),
                score: 100,
                survival_seconds: 30,
                token_balance: 100.0,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_referral_link() {
        let ledger = ReferralLedger::new(Arc::new(MemoryGameStore::new()), "https://pong.example/");
        assert_eq!(
            ledger.referral_link(&addr('a')),
            format!("https://pong.example?ref=0x{}", "a".repeat(40))
        );
    }

    #[tokio::test]
    async fn test_rejections() {
        let store = Arc::new(MemoryGameStore::new());
        let ledger = ReferralLedger::new(store.clone(), "https://pong.example");
        let (a, b) = (addr('a'), addr('b'));

        // Unknown referrer
        assert!(!ledger.add_referral(&a, &b).await.success);

        played(&store, &a).await;
        assert!(!ledger.add_referral(&a, &a).await.success);

        // Referee already played
        played(&store, &b).await;
        let outcome = ledger.add_referral(&a, &b).await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("User has already played their first game")
        );
    }

    #[tokio::test]
    async fn test_stats_counts_pending() {
        let store = Arc::new(MemoryGameStore::new());
        let ledger = ReferralLedger::new(store.clone(), "https://pong.example");
        let (a, b, c) = (addr('a'), addr('b'), addr('c'));
        played(&store, &a).await;

        assert!(ledger.add_referral(&a, &b).await.success);
        assert!(ledger.add_referral(&a, &c).await.success);
        store.claim_referee_reward(&b).await.unwrap();

        let stats = ledger.stats(&a).await.unwrap();
        assert_eq!(stats.total_referrals, 2);
        assert_eq!(stats.successful_referrals, 1);
        assert_eq!(stats.pending_referrals, 1);
        assert!(stats.can_share_referral);

        let stats = ledger.stats(&b).await.unwrap();
        assert_eq!(stats.total_referrals, 0);
        assert!(!stats.can_share_referral);
    }
}
