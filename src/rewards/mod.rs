//! Reward Settlement
//!
//! Turns a verified game session into minted PONG tokens and durable player
//! statistics, and manages the referral relationships that earn one-time bonuses.
//!
//! ## Settlement order
//!
//! ```text
//! validate ──► threshold ──► lookups ──► mint ──► balance ──► upsert ──► referrer bonus
//! ```
//!
//! Nothing is persisted until the mint is confirmed. A failed referrer bonus
//! never undoes the player's own reward.

pub mod latch;
pub mod referral;
pub mod settler;

pub use latch::{BonusLatch, FirstGame, Transition};
pub use referral::{ReferralLedger, ReferralOutcome, ReferralStats};
pub use settler::{RewardSettler, SettlementOutcome, SettlementPolicy};
