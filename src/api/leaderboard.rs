//! Leaderboard API
//!
//! Endpoints:
//!   GET /leaderboard                    -> Top 10 players by token balance
//!   GET /leaderboard?walletAddress=<a>  -> Rank of one player, or an empty list

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::ApiState;
use crate::database::{GameStore, LeaderboardEntry};
use crate::game::{Clock, WalletAddress};
use crate::token::TokenLedger;

pub const LEADERBOARD_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: i64,
    /// Token balance snapshot
    pub score: f64,
    pub wallet_address: WalletAddress,
}

impl LeaderboardRow {
    fn new(rank: i64, entry: LeaderboardEntry) -> Self {
        Self {
            rank,
            score: entry.pong_token_count,
            wallet_address: entry.wallet_address,
        }
    }
}

pub async fn get_leaderboard<S, T, C>(
    State(state): State<ApiState<S, T, C>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, StatusCode>
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    let result = match query.wallet_address.as_deref() {
        Some(raw) => {
            let Ok(address) = WalletAddress::parse(raw) else {
                warn!("Leaderboard lookup for malformed address");
                return Ok(Json(Vec::new()));
            };
            state.store.rank_of(&address).await.map(|ranked| {
                ranked
                    .map(|ranked| LeaderboardRow::new(ranked.rank, ranked.entry))
                    .into_iter()
                    .collect()
            })
        }
        None => state
            .store
            .top_by_tokens(LEADERBOARD_SIZE)
            .await
            .map(|entries| {
                entries
                    .into_iter()
                    .zip(1..)
                    .map(|(entry, rank)| LeaderboardRow::new(rank, entry))
                    .collect()
            }),
    };

    match result {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => {
            error!(error = %e, "Leaderboard fetch failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn create_router<S, T, C>(state: ApiState<S, T, C>) -> Router
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    Router::new()
        .route("/leaderboard", get(get_leaderboard::<S, T, C>))
        .with_state(state)
}
