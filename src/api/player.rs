//! Authenticated player extraction
//!
//! The wallet-session gateway in front of the oracle verifies the player's
//! signature and forwards the wallet address in a header.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use tracing::warn;

use crate::game::WalletAddress;

/// Header carrying the signed-in wallet address
pub const WALLET_HEADER: &str = "x-wallet-address";

/// The signed-in player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPlayer(pub WalletAddress);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedPlayer {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts
            .headers
            .get(WALLET_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            warn!("Missing wallet address for path: {}", parts.uri.path());
            return Err(StatusCode::UNAUTHORIZED);
        };

        match WalletAddress::parse(raw) {
            Ok(address) => Ok(Self(address)),
            Err(e) => {
                warn!("Invalid wallet address for path {}: {}", parts.uri.path(), e);
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<AuthenticatedPlayer, StatusCode> {
        let mut builder = Request::builder().uri("/game/reward");
        if let Some(value) = header {
            builder = builder.header(WALLET_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedPlayer::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_normalized_address() {
        let player = extract(Some("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"))
            .await
            .unwrap();
        assert_eq!(player.0.as_str(), format!("0x{}", "a".repeat(40)));
    }

    #[tokio::test]
    async fn test_rejects_missing_or_invalid() {
        assert_eq!(extract(None).await, Err(StatusCode::UNAUTHORIZED));
        assert_eq!(extract(Some("0x12")).await, Err(StatusCode::UNAUTHORIZED));
    }
}
