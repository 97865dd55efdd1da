//! Referral API endpoints
//!
//! Endpoints:
//!   POST /referral        -> Attribute the signed-in player to a referrer
//!   GET  /referral/stats  -> Referral progress of the signed-in player

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::error;

use super::ApiState;
use super::player::AuthenticatedPlayer;
use crate::database::GameStore;
use crate::game::{Clock, WalletAddress};
use crate::rewards::{ReferralOutcome, ReferralStats};
use crate::token::TokenLedger;

/// Referral code from the shared link
#[derive(Debug, Deserialize)]
pub struct AddReferralRequest {
    /// The referrer's wallet address
    pub address: String,
}

pub async fn add_referral<S, T, C>(
    State(state): State<ApiState<S, T, C>>,
    AuthenticatedPlayer(referee): AuthenticatedPlayer,
    Json(request): Json<AddReferralRequest>,
) -> Json<ReferralOutcome>
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    let referrer = match WalletAddress::parse(&request.address) {
        Ok(address) => address,
        Err(_) => {
            return Json(ReferralOutcome {
                success: false,
                message: Some("Invalid referrer address".to_string()),
            });
        }
    };

    Json(state.referrals.add_referral(&referrer, &referee).await)
}

pub async fn referral_stats<S, T, C>(
    State(state): State<ApiState<S, T, C>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
) -> Result<Json<ReferralStats>, StatusCode>
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    match state.referrals.stats(&player).await {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => {
            error!(address = %player, error = %e, "Failed to load referral stats");
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
        .route("/referral", post(add_referral::<S, T, C>))
        .route("/referral/stats", get(referral_stats::<S, T, C>))
        .with_state(state)
}
