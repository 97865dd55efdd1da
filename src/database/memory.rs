//! In-memory store used when PostgreSQL is disabled (dev mode) and in tests.
//!
//! A single lock guards both tables, so each operation is atomic with respect
//! to every other operation, matching the single-statement semantics of the
//! PostgreSQL backend.

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::database::GameStore;
use crate::database::leaderboard::{LeaderboardEntry, LeaderboardUpdate, RankedEntry};
use crate::database::referrals::{InsertOutcome, ReferralRecord};
use crate::game::WalletAddress;
use crate::rewards::latch::Transition;

#[derive(Debug, Default)]
struct Tables {
    leaderboard: HashMap<WalletAddress, LeaderboardEntry>,
    /// Keyed by referee
    referrals: HashMap<WalletAddress, ReferralRecord>,
}

impl Tables {
    fn ranked(&self) -> Vec<&LeaderboardEntry> {
        let mut entries: Vec<&LeaderboardEntry> = self.leaderboard.values().collect();
        entries.sort_by(|a, b| {
            b.pong_token_count
                .total_cmp(&a.pong_token_count)
                .then_with(|| a.wallet_address.cmp(&b.wallet_address))
        });
        entries
    }
}

#[derive(Debug, Default)]
pub struct MemoryGameStore {
    tables: RwLock<Tables>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn player_count(&self) -> usize {
        self.tables.read().await.leaderboard.len()
    }
}

impl GameStore for MemoryGameStore {
    async fn leaderboard_entry(&self, address: &WalletAddress) -> Result<Option<LeaderboardEntry>, String> {
        Ok(self.tables.read().await.leaderboard.get(address).cloned())
    }

    async fn upsert_leaderboard(&self, update: &LeaderboardUpdate) -> Result<LeaderboardEntry, String> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let entry = tables
            .leaderboard
            .entry(update.wallet_address.clone())
            .and_modify(|existing| existing.merge(update, now))
            .or_insert_with(|| LeaderboardEntry::first(update, now));

        debug!(address = %update.wallet_address, score = update.score, "Leaderboard entry upserted (in-memory)");
        Ok(entry.clone())
    }

    async fn record_referrer_reward(
        &self,
        referrer: &WalletAddress,
        token_balance: f64,
    ) -> Result<(), String> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .leaderboard
            .get_mut(referrer)
            .ok_or_else(|| format!("Referrer {} has no leaderboard entry", referrer))?;

        entry.pong_token_count = token_balance;
        entry.total_referrals += 1;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn top_by_tokens(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, String> {
        let tables = self.tables.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(tables.ranked().into_iter().take(limit).cloned().collect())
    }

    async fn rank_of(&self, address: &WalletAddress) -> Result<Option<RankedEntry>, String> {
        let tables = self.tables.read().await;
        let ranked = tables
            .ranked()
            .into_iter()
            .enumerate()
            .find(|(_, entry)| &entry.wallet_address == address)
            .map(|(index, entry)| RankedEntry {
                rank: index as i64 + 1,
                entry: entry.clone(),
            });
        Ok(ranked)
    }

    async fn referral_for_referee(&self, referee: &WalletAddress) -> Result<Option<ReferralRecord>, String> {
        Ok(self.tables.read().await.referrals.get(referee).cloned())
    }

    async fn referrals_by_referrer(&self, referrer: &WalletAddress) -> Result<Vec<ReferralRecord>, String> {
        let tables = self.tables.read().await;
        let mut records: Vec<ReferralRecord> = tables
            .referrals
            .values()
            .filter(|r| &r.referrer_address == referrer)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn insert_referral(
        &self,
        referrer: &WalletAddress,
        referee: &WalletAddress,
    ) -> Result<InsertOutcome, String> {
        let mut tables = self.tables.write().await;

        // Foreign key on the referrer
        if !tables.leaderboard.contains_key(referrer) {
            return Err(format!("Referrer {} has no leaderboard entry", referrer));
        }
        if tables.referrals.contains_key(referee) {
            return Ok(InsertOutcome::Conflict);
        }

        let record = ReferralRecord::new(referrer.clone(), referee.clone(), Utc::now());
        tables.referrals.insert(referee.clone(), record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn claim_referee_reward(&self, referee: &WalletAddress) -> Result<Transition, String> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.referrals.get_mut(referee) else {
            return Ok(Transition::AlreadySet);
        };

        let transition = record.referee_reward.give();
        if transition.applied() {
            record.first_game.mark_played();
            record.updated_at = Utc::now();
        }
        Ok(transition)
    }

    async fn claim_referrer_reward(&self, referee: &WalletAddress) -> Result<Transition, String> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.referrals.get_mut(referee) else {
            return Ok(Transition::AlreadySet);
        };

        let transition = record.referrer_reward.give();
        if transition.applied() {
            record.updated_at = Utc::now();
        }
        Ok(transition)
    }
}
