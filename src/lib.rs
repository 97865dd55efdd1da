//! PONG Reward Oracle
//!
//! Server-side anti-cheat and reward settlement for the PONG game. Clients
//! report finished rallies; the oracle checks them against the scoring rules
//! before minting PONG tokens on chain and updating the leaderboard.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── game/          - Session verification
//! │   ├── score.rs     - Multiplier curve & expected score
//! │   ├── session.rs   - Sessions and wallet addresses
//! │   └── validator.rs - Ordered anti-cheat checks
//! ├── rewards/       - Settlement
//! │   ├── latch.rs     - One-way first-game & bonus latches
//! │   ├── settler.rs   - Validate, mint, persist, referral bonuses
//! │   └── referral.rs  - Referral relationships & stats
//! ├── token/         - PONG token access
//! │   ├── abi.rs       - Calldata encoding
//! │   ├── client.rs    - JSON-RPC client
//! │   └── memory.rs    - In-memory ledger
//! ├── database/      - Leaderboard & referral persistence
//! │   ├── pool.rs      - PostgreSQL pool
//! │   ├── leaderboard.rs
//! │   ├── referrals.rs
//! │   └── memory.rs    - In-memory fallback
//! └── api/           - HTTP API endpoints
//!     ├── game.rs      - Reward & first-game check
//!     ├── referral.rs  - Referral add & stats
//!     ├── leaderboard.rs
//!     ├── player.rs    - Signed-in wallet extraction
//!     └── middleware.rs - Gateway auth, rate limiting, headers
//! ```

pub mod api;
pub mod config;
pub mod database;
pub mod game;
pub mod rewards;
pub mod token;

// Re-export main types for convenience
pub use config::OracleConfig;
pub use database::{DatabasePool, GameStore, MemoryGameStore};
pub use game::{
    Clock, MultiplierCurve, Session, SessionValidator, SystemClock, ValidationFailure,
    ValidationLimits, WalletAddress, expected_score, multiplier_at,
};
pub use rewards::{
    ReferralLedger, ReferralOutcome, ReferralStats, RewardSettler, SettlementOutcome,
    SettlementPolicy,
};
pub use token::{InMemoryTokenLedger, RpcTokenClient, TokenLedger};

// Re-export API types
pub use api::{ApiState, SecurityMiddlewareConfig, SecurityState, create_router};
