//! HTTP API endpoints for the PONG Reward Oracle
//!
//! Provides REST APIs for:
//! - Game settlement and first-game checks
//! - Referrals (add, stats)
//! - Leaderboard
//! - Security middleware (gateway auth, rate limiting, headers)

pub mod game;
pub mod leaderboard;
pub mod middleware;
pub mod player;
pub mod referral;

use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::database::GameStore;
use crate::game::{Clock, SystemClock};
use crate::rewards::{ReferralLedger, RewardSettler};
use crate::token::TokenLedger;

pub use middleware::{
    PUBLIC_PATHS, RateLimiter, SecurityMiddlewareConfig, SecurityState, auth_middleware,
    body_size_middleware, logging_middleware, rate_limit_middleware, security_headers_middleware,
};
pub use player::{AuthenticatedPlayer, WALLET_HEADER};

// ============================================================================
// State
// ============================================================================

/// Shared state of all player-facing routes
pub struct ApiState<S, T, C = SystemClock> {
    pub settler: Arc<RewardSettler<S, T, C>>,
    pub referrals: Arc<ReferralLedger<S>>,
    pub store: Arc<S>,
}

impl<S, T, C> ApiState<S, T, C> {
    pub fn new(
        settler: RewardSettler<S, T, C>,
        referrals: ReferralLedger<S>,
        store: Arc<S>,
    ) -> Self {
        Self {
            settler: Arc::new(settler),
            referrals: Arc::new(referrals),
            store,
        }
    }
}

impl<S, T, C> Clone for ApiState<S, T, C> {
    fn clone(&self) -> Self {
        Self {
            settler: self.settler.clone(),
            referrals: self.referrals.clone(),
            store: self.store.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ============================================================================
// Router
// ============================================================================

/// All routes, without security layers
pub fn create_router<S, T, C>(state: ApiState<S, T, C>) -> Router
where
    S: GameStore,
    T: TokenLedger,
    C: Clock + 'static,
{
    Router::new()
        .merge(game::create_router(state.clone()))
        .merge(referral::create_router(state.clone()))
        .merge(leaderboard::create_router(state))
        .route("/health", get(health))
}
