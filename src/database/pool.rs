//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::GameStore;
use crate::database::leaderboard::{
    LeaderboardEntry, LeaderboardRepository, LeaderboardUpdate, RankedEntry,
};
use crate::database::referrals::{InsertOutcome, ReferralRecord, ReferralRepository};
use crate::game::WalletAddress;
use crate::rewards::latch::Transition;

pub struct DatabasePool {
    pool: PgPool,
    leaderboard: LeaderboardRepository,
    referrals: ReferralRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, String> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| format!("Failed to connect to PostgreSQL: {}", e))?;

        info!("Connected to PostgreSQL");

        let leaderboard = LeaderboardRepository::new(pool.clone());
        let referrals = ReferralRepository::new(pool.clone());

        Ok(Self {
            pool,
            leaderboard,
            referrals,
        })
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing database schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS pong")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create pong schema: {}", e))?;

        self.leaderboard.init_schema().await?;
        self.referrals.init_schema().await?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn leaderboard(&self) -> &LeaderboardRepository {
        &self.leaderboard
    }

    pub fn referrals(&self) -> &ReferralRepository {
        &self.referrals
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl GameStore for DatabasePool {
    async fn leaderboard_entry(&self, address: &WalletAddress) -> Result<Option<LeaderboardEntry>, String> {
        self.leaderboard.get_entry(address).await
    }

    async fn upsert_leaderboard(&self, update: &LeaderboardUpdate) -> Result<LeaderboardEntry, String> {
        self.leaderboard.upsert(update).await
    }

    async fn record_referrer_reward(
        &self,
        referrer: &WalletAddress,
        token_balance: f64,
    ) -> Result<(), String> {
        self.leaderboard
            .record_referrer_reward(referrer, token_balance)
            .await
    }

    async fn top_by_tokens(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, String> {
        self.leaderboard.top_by_tokens(limit).await
    }

    async fn rank_of(&self, address: &WalletAddress) -> Result<Option<RankedEntry>, String> {
        self.leaderboard.rank_of(address).await
    }

    async fn referral_for_referee(&self, referee: &WalletAddress) -> Result<Option<ReferralRecord>, String> {
        self.referrals.get_by_referee(referee).await
    }

    async fn referrals_by_referrer(&self, referrer: &WalletAddress) -> Result<Vec<ReferralRecord>, String> {
        self.referrals.get_by_referrer(referrer).await
    }

    async fn insert_referral(
        &self,
        referrer: &WalletAddress,
        referee: &WalletAddress,
    ) -> Result<InsertOutcome, String> {
        self.referrals.insert(referrer, referee).await
    }

    async fn claim_referee_reward(&self, referee: &WalletAddress) -> Result<Transition, String> {
        self.referrals.claim_referee_reward(referee).await
    }

    async fn claim_referrer_reward(&self, referee: &WalletAddress) -> Result<Transition, String> {
        self.referrals.claim_referrer_reward(referee).await
    }
}
