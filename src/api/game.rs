//! Game API endpoints
//!
//! Endpoints:
//!   POST /game/reward      -> Settle a finished game session for the signed-in player
//!   POST /game/first-game  -> Whether a wallet has completed a rewarded game

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::ApiState;
use super::player::AuthenticatedPlayer;
use crate::database::GameStore;
use crate::game::{Clock, Session, WalletAddress};
use crate::rewards::SettlementOutcome;
use crate::token::TokenLedger;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Finished game as reported by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRequest {
    pub score: f64,
    pub start_time: i64,
    pub end_time: i64,
    pub count: i64,
}

impl RewardRequest {
    pub fn into_session(self, player: WalletAddress) -> Session {
        Session {
            user_id: player,
            start_time_ms: self.start_time,
            end_time_ms: self.end_time,
            bounce_count: self.count,
            claimed_score: self.score,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FirstGameRequest {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstGameError {
    pub code: u8,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstGameData {
    pub result: bool,
}

/// Status envelope consumed by quest integrations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstGameResponse {
    pub error: FirstGameError,
    pub data: FirstGameData,
}

impl FirstGameResponse {
    pub const OK: u8 = 0;
    pub const INVALID_ADDRESS: u8 = 1;
    pub const INTERNAL_ERROR: u8 = 2;

    fn played(result: bool) -> Self {
        Self {
            error: FirstGameError {
                code: Self::OK,
                message: String::new(),
            },
            data: FirstGameData { result },
        }
    }

    fn failed(code: u8, message: &str) -> Self {
        Self {
            error: FirstGameError {
                code,
                message: message.to_string(),
            },
            data: FirstGameData { result: false },
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Settle a game session
pub async fn settle_reward<S, T, C>(
    State(state): State<ApiState<S, T, C>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
    body: Result<Json<RewardRequest>, JsonRejection>,
) -> Json<SettlementOutcome>
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(address = %player, error = %rejection.body_text(), "Malformed reward request");
            return Json(SettlementOutcome::rejected(format!(
                "Invalid game data. {}",
                rejection.body_text()
            )));
        }
    };

    let session = request.into_session(player);
    Json(state.settler.settle(&session).await)
}

/// Check whether a wallet has played its first rewarded game
pub async fn first_game<S, T, C>(
    State(state): State<ApiState<S, T, C>>,
    body: Result<Json<FirstGameRequest>, JsonRejection>,
) -> Json<FirstGameResponse>
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    let address = match body
        .ok()
        .and_then(|Json(request)| WalletAddress::parse(&request.address).ok())
    {
        Some(address) => address,
        None => {
            warn!("First-game check with invalid or missing address");
            return Json(FirstGameResponse::failed(
                FirstGameResponse::INVALID_ADDRESS,
                "Invalid or missing wallet address",
            ));
        }
    };

    match state.store.leaderboard_entry(&address).await {
        Ok(entry) => Json(FirstGameResponse::played(
            entry.is_some_and(|entry| entry.first_game.is_played()),
        )),
        Err(e) => {
            error!(address = %address, error = %e, "First-game check failed");
            Json(FirstGameResponse::failed(
                FirstGameResponse::INTERNAL_ERROR,
                "Internal server error",
            ))
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router<S, T, C>(state: ApiState<S, T, C>) -> Router
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    Router::new()
        .route("/game/reward", post(settle_reward::<S, T, C>))
        .route("/game/first-game", post(first_game::<S, T, C>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_request_uses_client_field_names() {
        let request: RewardRequest = serde_json::from_str(
            r#"{"score": 13.2068, "startTime": 1000, "endTime": 11000, "count": 10}"#,
        )
        .unwrap();
        let player = WalletAddress::parse("0x1111111111111111111111111111111111111111").unwrap();
        let session = request.into_session(player.clone());

        assert_eq!(session.user_id, player);
        assert_eq!(session.duration_ms(), 10_000);
        assert_eq!(session.bounce_count, 10);
    }

    #[test]
    fn test_reward_request_requires_all_fields() {
        let result: Result<RewardRequest, _> =
            serde_json::from_str(r#"{"score": 13.2068, "startTime": 1000, "endTime": 11000}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_first_game_envelope() {
        let json = serde_json::to_value(FirstGameResponse::failed(
            FirstGameResponse::INVALID_ADDRESS,
            "Invalid or missing wallet address",
        ))
        .unwrap();
        assert_eq!(json["error"]["code"], 1);
        assert_eq!(json["data"]["result"], false);
    }
}
