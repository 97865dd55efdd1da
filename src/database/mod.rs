//! Player Statistics Persistence
//!
//! Durable leaderboard and referral records. Two backends implement
//! [`GameStore`]:
//!
//! - [`DatabasePool`]: PostgreSQL via sqlx, atomic upserts and conditional latch updates
//! - [`MemoryGameStore`]: in-process fallback for development and tests
//!
//! Every mutation is keyed by wallet address and performed as a single
//! read-modify-write statement so concurrent settlements for the same player
//! cannot lose updates.

pub mod leaderboard;
pub mod memory;
pub mod pool;
pub mod referrals;

use std::future::Future;

use crate::game::WalletAddress;
use crate::rewards::latch::Transition;

pub use leaderboard::{LeaderboardEntry, LeaderboardRepository, LeaderboardUpdate, RankedEntry};
pub use memory::MemoryGameStore;
pub use pool::DatabasePool;
pub use referrals::{InsertOutcome, ReferralRecord, ReferralRepository};

/// Storage operations used by settlement, referrals and the leaderboard API
pub trait GameStore: Send + Sync + 'static {
    fn leaderboard_entry(
        &self,
        address: &WalletAddress,
    ) -> impl Future<Output = Result<Option<LeaderboardEntry>, String>> + Send;

    /// Insert or update a player's entry.
    ///
    /// High score and survival keep the greater of stored and new values, the
    /// token count is replaced and the first-game latch is closed.
    fn upsert_leaderboard(
        &self,
        update: &LeaderboardUpdate,
    ) -> impl Future<Output = Result<LeaderboardEntry, String>> + Send;

    /// Store a referrer's fresh token balance and count one more rewarded referral
    fn record_referrer_reward(
        &self,
        referrer: &WalletAddress,
        token_balance: f64,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// Entries ordered by token count, highest first
    fn top_by_tokens(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<LeaderboardEntry>, String>> + Send;

    /// A single player's 1-based position in the token ordering
    fn rank_of(
        &self,
        address: &WalletAddress,
    ) -> impl Future<Output = Result<Option<RankedEntry>, String>> + Send;

    fn referral_for_referee(
        &self,
        referee: &WalletAddress,
    ) -> impl Future<Output = Result<Option<ReferralRecord>, String>> + Send;

    fn referrals_by_referrer(
        &self,
        referrer: &WalletAddress,
    ) -> impl Future<Output = Result<Vec<ReferralRecord>, String>> + Send;

    /// Create a referral record; a second record for the same referee is a conflict
    fn insert_referral(
        &self,
        referrer: &WalletAddress,
        referee: &WalletAddress,
    ) -> impl Future<Output = Result<InsertOutcome, String>> + Send;

    /// Close the referee-reward and first-game latches of the referee's record
    fn claim_referee_reward(
        &self,
        referee: &WalletAddress,
    ) -> impl Future<Output = Result<Transition, String>> + Send;

    /// Close the referrer-reward latch of the referee's record
    fn claim_referrer_reward(
        &self,
        referee: &WalletAddress,
    ) -> impl Future<Output = Result<Transition, String>> + Send;
}
