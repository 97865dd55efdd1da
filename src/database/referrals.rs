//! Referral Repository - PostgreSQL operations for referral records using sqlx

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::WalletAddress;
use crate::rewards::latch::{BonusLatch, FirstGame, Transition};

/// One record per referee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub id: Uuid,
    pub referrer_address: WalletAddress,
    pub referee_address: WalletAddress,
    /// Closed when the referee's first game is settled
    pub first_game: FirstGame,
    pub referrer_reward: BonusLatch,
    pub referee_reward: BonusLatch,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReferralRecord {
    pub fn new(referrer: WalletAddress, referee: WalletAddress, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer_address: referrer,
            referee_address: referee,
            first_game: FirstGame::NeverPlayed,
            referrer_reward: BonusLatch::NoBonus,
            referee_reward: BonusLatch::NoBonus,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of a referral insert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(ReferralRecord),
    /// The referee already has a record (first write wins)
    Conflict,
}

const RECORD_COLUMNS: &str = "id, referrer_address, referee_address, is_first_game_played, \
     referrer_reward_given, referee_reward_given, created_at, updated_at";

fn record_from_row(row: &PgRow) -> Result<ReferralRecord, String> {
    let referrer: String = row.get("referrer_address");
    let referee: String = row.get("referee_address");
    let first_game: bool = row.get("is_first_game_played");
    let referrer_reward: bool = row.get("referrer_reward_given");
    let referee_reward: bool = row.get("referee_reward_given");

    Ok(ReferralRecord {
        id: row.get("id"),
        referrer_address: WalletAddress::parse(&referrer)
            .map_err(|e| format!("Corrupt referrer address {}: {}", referrer, e))?,
        referee_address: WalletAddress::parse(&referee)
            .map_err(|e| format!("Corrupt referee address {}: {}", referee, e))?,
        first_game: first_game.into(),
        referrer_reward: referrer_reward.into(),
        referee_reward: referee_reward.into(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn transition_from(rows_affected: u64) -> Transition {
    if rows_affected > 0 {
        Transition::Applied
    } else {
        Transition::AlreadySet
    }
}

pub struct ReferralRepository {
    pool: PgPool,
}

impl ReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Requires the leaderboard table to exist
    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pong.referrals (
                id UUID PRIMARY KEY,
                referrer_address VARCHAR(42) NOT NULL REFERENCES pong.leaderboard(wallet_address),
                referee_address VARCHAR(42) NOT NULL UNIQUE,
                is_first_game_played BOOLEAN NOT NULL DEFAULT FALSE,
                referrer_reward_given BOOLEAN NOT NULL DEFAULT FALSE,
                referee_reward_given BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create referrals table: {}", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON pong.referrals(referrer_address)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create referrals index: {}", e))?;

        info!("Referrals table ready");
        Ok(())
    }

    pub async fn get_by_referee(&self, referee: &WalletAddress) -> Result<Option<ReferralRecord>, String> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pong.referrals WHERE referee_address = $1",
            RECORD_COLUMNS
        ))
        .bind(referee.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get referral: {}", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    pub async fn get_by_referrer(&self, referrer: &WalletAddress) -> Result<Vec<ReferralRecord>, String> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pong.referrals WHERE referrer_address = $1 ORDER BY created_at ASC",
            RECORD_COLUMNS
        ))
        .bind(referrer.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to get referrals: {}", e))?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn insert(
        &self,
        referrer: &WalletAddress,
        referee: &WalletAddress,
    ) -> Result<InsertOutcome, String> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO pong.referrals (id, referrer_address, referee_address)
            VALUES ($1, $2, $3)
            ON CONFLICT (referee_address) DO NOTHING
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(referrer.as_str())
        .bind(referee.as_str())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => {
                debug!(referrer = %referrer, referee = %referee, "Referral recorded");
                Ok(InsertOutcome::Inserted(record_from_row(&row)?))
            }
            Ok(None) => Ok(InsertOutcome::Conflict),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(InsertOutcome::Conflict),
            Err(e) => Err(format!("Failed to insert referral: {}", e)),
        }
    }

    pub async fn claim_referee_reward(&self, referee: &WalletAddress) -> Result<Transition, String> {
        let result = sqlx::query(
            r#"
            UPDATE pong.referrals
            SET referee_reward_given = TRUE,
                is_first_game_played = TRUE,
                updated_at = NOW()
            WHERE referee_address = $1 AND referee_reward_given = FALSE
            "#,
        )
        .bind(referee.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to claim referee reward: {}", e))?;

        Ok(transition_from(result.rows_affected()))
    }

    pub async fn claim_referrer_reward(&self, referee: &WalletAddress) -> Result<Transition, String> {
        let result = sqlx::query(
            r#"
            UPDATE pong.referrals
            SET referrer_reward_given = TRUE,
                updated_at = NOW()
            WHERE referee_address = $1 AND referrer_reward_given = FALSE
            "#,
        )
        .bind(referee.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to claim referrer reward: {}", e))?;

        Ok(transition_from(result.rows_affected()))
    }
}
