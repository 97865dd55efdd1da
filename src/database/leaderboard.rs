//! Leaderboard Repository - PostgreSQL operations for player statistics using sqlx

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::game::WalletAddress;
use crate::rewards::latch::FirstGame;

/// One row per player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub wallet_address: WalletAddress,
    /// Best floored score, never decreases
    pub high_score: i64,
    /// Longest round in whole seconds, never decreases
    pub longest_survival: i64,
    /// Last on-chain balance read back after a mint
    pub pong_token_count: f64,
    pub total_referrals: i64,
    pub first_game: FirstGame,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    /// Entry for a player's first settled game
    pub fn first(update: &LeaderboardUpdate, now: DateTime<Utc>) -> Self {
        Self {
            wallet_address: update.wallet_address.clone(),
            high_score: update.score,
            longest_survival: update.survival_seconds,
            pong_token_count: update.token_balance,
            total_referrals: 0,
            first_game: FirstGame::PlayedFirstGame,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a new result into an existing entry with greatest-of semantics
    pub fn merge(&mut self, update: &LeaderboardUpdate, now: DateTime<Utc>) {
        self.high_score = self.high_score.max(update.score);
        self.longest_survival = self.longest_survival.max(update.survival_seconds);
        self.pong_token_count = update.token_balance;
        self.first_game.mark_played();
        self.updated_at = now;
    }
}

/// Result of one settled game, applied with [`LeaderboardEntry::merge`] semantics
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardUpdate {
    pub wallet_address: WalletAddress,
    pub score: i64,
    pub survival_seconds: i64,
    pub token_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: i64,
    pub entry: LeaderboardEntry,
}

const ENTRY_COLUMNS: &str = "wallet_address, high_score, longest_survival, pong_token_count, \
     total_referrals, has_played_first_game, created_at, updated_at";

fn entry_from_row(row: &PgRow) -> Result<LeaderboardEntry, String> {
    let address: String = row.get("wallet_address");
    let has_played: bool = row.get("has_played_first_game");

    Ok(LeaderboardEntry {
        wallet_address: WalletAddress::parse(&address)
            .map_err(|e| format!("Corrupt wallet address {}: {}", address, e))?,
        high_score: row.get("high_score"),
        longest_survival: row.get("longest_survival"),
        pong_token_count: row.get("pong_token_count"),
        total_referrals: row.get("total_referrals"),
        first_game: FirstGame::from(has_played),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub struct LeaderboardRepository {
    pool: PgPool,
}

impl LeaderboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pong.leaderboard (
                wallet_address VARCHAR(42) PRIMARY KEY,
                high_score BIGINT NOT NULL DEFAULT 0,
                longest_survival BIGINT NOT NULL DEFAULT 0,
                pong_token_count DOUBLE PRECISION NOT NULL DEFAULT 0,
                total_referrals BIGINT NOT NULL DEFAULT 0,
                has_played_first_game BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create leaderboard table: {}", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_leaderboard_tokens ON pong.leaderboard(pong_token_count DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create leaderboard index: {}", e))?;

        info!("Leaderboard table ready");
        Ok(())
    }

    pub async fn get_entry(&self, address: &WalletAddress) -> Result<Option<LeaderboardEntry>, String> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pong.leaderboard WHERE wallet_address = $1",
            ENTRY_COLUMNS
        ))
        .bind(address.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get leaderboard entry: {}", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    /// Single-statement upsert; GREATEST keeps the monotonic columns monotonic
    /// under concurrent settlements.
    pub async fn upsert(&self, update: &LeaderboardUpdate) -> Result<LeaderboardEntry, String> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO pong.leaderboard
            (wallet_address, high_score, longest_survival, pong_token_count,
             has_played_first_game, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW())
            ON CONFLICT (wallet_address) DO UPDATE SET
                high_score = GREATEST(pong.leaderboard.high_score, EXCLUDED.high_score),
                longest_survival = GREATEST(pong.leaderboard.longest_survival, EXCLUDED.longest_survival),
                pong_token_count = EXCLUDED.pong_token_count,
                has_played_first_game = TRUE,
                updated_at = NOW()
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(update.wallet_address.as_str())
        .bind(update.score)
        .bind(update.survival_seconds)
        .bind(update.token_balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert leaderboard entry: {}", e))?;

        debug!(address = %update.wallet_address, score = update.score, "Leaderboard entry upserted");
        entry_from_row(&row)
    }

    pub async fn record_referrer_reward(
        &self,
        referrer: &WalletAddress,
        token_balance: f64,
    ) -> Result<(), String> {
        let result = sqlx::query(
            r#"
            UPDATE pong.leaderboard
            SET pong_token_count = $2,
                total_referrals = total_referrals + 1,
                updated_at = NOW()
            WHERE wallet_address = $1
            "#,
        )
        .bind(referrer.as_str())
        .bind(token_balance)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to record referrer reward: {}", e))?;

        if result.rows_affected() == 0 {
            return Err(format!("Referrer {} has no leaderboard entry", referrer));
        }
        Ok(())
    }

    pub async fn top_by_tokens(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, String> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM pong.leaderboard
            ORDER BY pong_token_count DESC, wallet_address ASC
            LIMIT $1
            "#,
            ENTRY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to get leaderboard: {}", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    pub async fn rank_of(&self, address: &WalletAddress) -> Result<Option<RankedEntry>, String> {
        let row = sqlx::query(&format!(
            r#"
            SELECT * FROM (
                SELECT {},
                       ROW_NUMBER() OVER (ORDER BY pong_token_count DESC, wallet_address ASC) AS rank
                FROM pong.leaderboard
            ) ranked
            WHERE wallet_address = $1
            "#,
            ENTRY_COLUMNS
        ))
        .bind(address.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get leaderboard rank: {}", e))?;

        match row {
            Some(row) => Ok(Some(RankedEntry {
                rank: row.get("rank"),
                entry: entry_from_row(&row)?,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(score: i64, survival: i64, balance: f64) -> LeaderboardUpdate {
        LeaderboardUpdate {
            wallet_address: WalletAddress::parse("0x2222222222222222222222222222222222222222").unwrap(),
            score,
            survival_seconds: survival,
            token_balance: balance,
        }
    }

    #[test]
    fn test_first_entry() {
        let entry = LeaderboardEntry::first(&update(13, 10, 13.0), Utc::now());
        assert_eq!(entry.high_score, 13);
        assert_eq!(entry.longest_survival, 10);
        assert_eq!(entry.total_referrals, 0);
        assert!(entry.first_game.is_played());
    }

    #[test]
    fn test_merge_is_monotonic() {
        let mut entry = LeaderboardEntry::first(&update(150, 40, 150.0), Utc::now());
        entry.merge(&update(120, 55, 270.0), Utc::now());
        assert_eq!(entry.high_score, 150);
        assert_eq!(entry.longest_survival, 55);
        assert_eq!(entry.pong_token_count, 270.0);

        entry.merge(&update(300, 10, 570.0), Utc::now());
        assert_eq!(entry.high_score, 300);
        assert_eq!(entry.longest_survival, 55);
    }
}
