//! Reward settlement for finished game sessions

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::database::{GameStore, LeaderboardUpdate, ReferralRecord};
use crate::game::session::floor_points;
use crate::game::{Clock, Session, SessionValidator, SystemClock, WalletAddress};
use crate::rewards::latch::Transition;
use crate::token::TokenLedger;

pub const REWARD_CREDITED: &str = "Reward credited successfully!";
pub const REWARD_FAILED: &str = "Reward failed. Please try again.";
pub const REFEREE_BONUS_NOTE: &str = "Referral bonus applied: first game reward doubled!";

/// Business rules applied on top of session validity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettlementPolicy {
    /// Sessions scoring below `threshold - 1` whole points earn nothing
    pub minimum_score_threshold: i64,
    /// Applied to a referred player's first rewarded game
    pub referee_multiplier: i64,
    /// Applied to the referee's original claimed score for the referrer's bonus
    pub referrer_multiplier: f64,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            minimum_score_threshold: 100,
            referee_multiplier: 2,
            referrer_multiplier: 3.0,
        }
    }
}

impl SettlementPolicy {
    pub fn meets_threshold(&self, floored_score: i64) -> bool {
        floored_score >= self.minimum_score_threshold - 1
    }
}

/// Response of a settlement request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub success: bool,
    pub message: String,
}

impl SettlementOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn credited(bonus_note: Option<&str>) -> Self {
        let message = match bonus_note {
            Some(note) => format!("{} {}", REWARD_CREDITED, note),
            None => REWARD_CREDITED.to_string(),
        };
        Self {
            success: true,
            message,
        }
    }
}

/// Orchestrates validation, minting and persistence of one game's reward.
///
/// Settlements for the same player run one at a time within this process, so
/// the first-game bonus is decided and minted by exactly one of them.
pub struct RewardSettler<S, T, C = SystemClock> {
    validator: SessionValidator<C>,
    policy: SettlementPolicy,
    store: Arc<S>,
    token: Arc<T>,
    in_flight: DashMap<WalletAddress, Arc<Mutex<()>>>,
}

impl<S, T, C> RewardSettler<S, T, C>
where
    S: GameStore,
    T: TokenLedger,
    C: Clock,
{
    pub fn new(
        validator: SessionValidator<C>,
        policy: SettlementPolicy,
        store: Arc<S>,
        token: Arc<T>,
    ) -> Self {
        Self {
            validator,
            policy,
            store,
            token,
            in_flight: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    pub fn validator(&self) -> &SessionValidator<C> {
        &self.validator
    }

    /// Settle one session for `session.user_id`.
    ///
    /// Every failure is reported in the outcome; this never returns an error.
    pub async fn settle(&self, session: &Session) -> SettlementOutcome {
        let player = &session.user_id;

        if let Err(failure) = self.validator.validate(session) {
            warn!(
                address = %player,
                reason = failure.code(),
                "Rejected game session: {}",
                failure
            );
            return SettlementOutcome::rejected(format!(
                "Invalid game data. {}",
                capitalize(&failure.to_string())
            ));
        }

        let score = session.floored_score();
        if !self.policy.meets_threshold(score) {
            debug!(address = %player, score = score, "Score below reward threshold");
            return SettlementOutcome::rejected(format!(
                "Score atleast {} to get reward.",
                self.policy.minimum_score_threshold
            ));
        }

        let lock = self
            .in_flight
            .entry(player.clone())
            .or_default()
            .clone();
        let outcome = {
            let _guard = lock.lock().await;
            self.settle_locked(session, score).await
        };
        drop(lock);
        self.in_flight
            .remove_if(player, |_, lock| Arc::strong_count(lock) == 1);

        outcome
    }

    /// Steps after validation; the caller holds the player's lock
    async fn settle_locked(&self, session: &Session, score: i64) -> SettlementOutcome {
        let player = &session.user_id;

        let existing = match self.store.leaderboard_entry(player).await {
            Ok(entry) => entry,
            Err(e) => {
                error!(address = %player, error = %e, "Failed to load leaderboard entry");
                return SettlementOutcome::rejected(REWARD_FAILED);
            }
        };

        let referral = match self.store.referral_for_referee(player).await {
            Ok(record) => record,
            Err(e) => {
                error!(address = %player, error = %e, "Failed to load referral record");
                return SettlementOutcome::rejected(REWARD_FAILED);
            }
        };

        let first_game = existing
            .as_ref()
            .is_none_or(|entry| !entry.first_game.is_played());
        let bonus_referral =
            referral.filter(|record| first_game && !record.referee_reward.is_given());

        let reward = if bonus_referral.is_some() {
            score.saturating_mul(self.policy.referee_multiplier)
        } else {
            score
        };
        let amount = u64::try_from(reward).unwrap_or(0);

        if let Err(e) = self.token.mint(player, amount).await {
            error!(address = %player, amount = amount, error = %e, "Reward mint failed");
            return SettlementOutcome::rejected(REWARD_FAILED);
        }

        let previous_balance = existing.as_ref().map_or(0.0, |entry| entry.pong_token_count);
        let balance = match self.token.balance_of(player).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(
                    address = %player,
                    error = %e,
                    "Balance read failed after mint, keeping previous snapshot"
                );
                previous_balance
            }
        };

        let update = LeaderboardUpdate {
            wallet_address: player.clone(),
            score,
            survival_seconds: session.survival_seconds(),
            token_balance: balance,
        };
        match self.store.upsert_leaderboard(&update).await {
            Ok(entry) => info!(
                address = %player,
                amount = amount,
                high_score = entry.high_score,
                balance = entry.pong_token_count,
                "Reward settled"
            ),
            // The mint is irreversible; the balance is reconciled on the next settlement.
            Err(e) => error!(
                address = %player,
                amount = amount,
                error = %e,
                "Failed to persist leaderboard entry after mint"
            ),
        }

        let Some(record) = bonus_referral else {
            return SettlementOutcome::credited(None);
        };

        match self.store.claim_referee_reward(player).await {
            Ok(Transition::Applied) => {
                self.reward_referrer(&record, session.claimed_score).await;
                SettlementOutcome::credited(Some(REFEREE_BONUS_NOTE))
            }
            Ok(Transition::AlreadySet) => {
                warn!(
                    referee = %player,
                    "Referee bonus latch already closed by another settlement"
                );
                SettlementOutcome::credited(None)
            }
            Err(e) => {
                // The doubled reward is already minted; the referrer is not paid
                // until the latch can be closed.
                error!(referee = %player, error = %e, "Failed to close referee bonus latch");
                SettlementOutcome::credited(Some(REFEREE_BONUS_NOTE))
            }
        }
    }

    /// Pay the referrer's one-time bonus. Failures are logged only.
    async fn reward_referrer(&self, record: &ReferralRecord, claimed_score: f64) {
        let referrer = &record.referrer_address;
        if record.referrer_reward.is_given() {
            return;
        }

        let bonus = floor_points(claimed_score * self.policy.referrer_multiplier);
        let amount = u64::try_from(bonus).unwrap_or(0);

        if let Err(e) = self.token.mint(referrer, amount).await {
            error!(
                referrer = %referrer,
                referee = %record.referee_address,
                amount = amount,
                error = %e,
                "Referrer bonus mint failed"
            );
            return;
        }

        let balance = match self.current_balance(referrer).await {
            Some(balance) => balance,
            None => return,
        };

        if let Err(e) = self.store.record_referrer_reward(referrer, balance).await {
            error!(referrer = %referrer, amount = amount, error = %e, "Failed to record referrer bonus");
            return;
        }

        match self.store.claim_referrer_reward(&record.referee_address).await {
            Ok(Transition::Applied) => info!(
                referrer = %referrer,
                referee = %record.referee_address,
                amount = amount,
                "Referrer bonus paid"
            ),
            Ok(Transition::AlreadySet) => {
                warn!(referrer = %referrer, "Referrer bonus latch was already closed")
            }
            Err(e) => error!(referrer = %referrer, error = %e, "Failed to close referrer bonus latch"),
        }
    }

    /// On-chain balance, falling back to the stored snapshot
    async fn current_balance(&self, address: &WalletAddress) -> Option<f64> {
        match self.token.balance_of(address).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(address = %address, error = %e, "Balance read failed, keeping previous snapshot");
                match self.store.leaderboard_entry(address).await {
                    Ok(entry) => Some(entry.map_or(0.0, |entry| entry.pong_token_count)),
                    Err(e) => {
                        error!(address = %address, error = %e, "Failed to load leaderboard entry");
                        None
                    }
                }
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryGameStore;
    use crate::game::{MultiplierCurve, ValidationLimits};
    use crate::token::InMemoryTokenLedger;

    const NOW: i64 = 1_700_000_000_000;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            NOW
        }
    }

    fn addr(c: char) -> WalletAddress {
        WalletAddress::parse(&format!("0x{}", c.to_string().repeat(40))).unwrap()
    }

    fn settler(
        threshold: i64,
    ) -> (
        RewardSettler<MemoryGameStore, InMemoryTokenLedger, FixedClock>,
        Arc<MemoryGameStore>,
        Arc<InMemoryTokenLedger>,
    ) {
        let store = Arc::new(MemoryGameStore::new());
        let token = Arc::new(InMemoryTokenLedger::new());
        let validator = SessionValidator::with_clock(
            MultiplierCurve::new(0.0, None),
            ValidationLimits::default(),
            FixedClock,
        );
        let policy = SettlementPolicy {
            minimum_score_threshold: threshold,
            ..SettlementPolicy::default()
        };
        (
            RewardSettler::new(validator, policy, store.clone(), token.clone()),
            store,
            token,
        )
    }

    /// Zero growth: score equals bounce count
    fn session(player: &WalletAddress, count: i64) -> Session {
        Session {
            user_id: player.clone(),
            start_time_ms: NOW - 60_000,
            end_time_ms: NOW - 1_000,
            bounce_count: count,
            claimed_score: count as f64,
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let policy = SettlementPolicy::default();
        assert!(policy.meets_threshold(99));
        assert!(!policy.meets_threshold(98));
    }

    #[tokio::test]
    async fn test_below_threshold_mints_nothing() {
        let (settler, store, token) = settler(100);
        let outcome = settler.settle(&session(&addr('a'), 50)).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Score atleast 100 to get reward.");
        assert!(token.mints().await.is_empty());
        assert_eq!(store.player_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_session_reports_reason() {
        let (settler, _, token) = settler(1);
        let mut s = session(&addr('a'), 50);
        s.claimed_score = 500.0;

        let outcome = settler.settle(&s).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Invalid game data."));
        assert!(token.mints().await.is_empty());
    }

    #[tokio::test]
    async fn test_settle_creates_entry() {
        let (settler, store, token) = settler(100);
        let player = addr('a');
        let outcome = settler.settle(&session(&player, 120)).await;

        assert_eq!(outcome, SettlementOutcome::credited(None));
        assert_eq!(token.raw_balance(&player).await, 120);

        let entry = store.leaderboard_entry(&player).await.unwrap().unwrap();
        assert_eq!(entry.high_score, 120);
        assert_eq!(entry.longest_survival, 59);
        assert_eq!(entry.pong_token_count, 120.0);
        assert!(entry.first_game.is_played());
    }

    #[tokio::test]
    async fn test_balance_failure_keeps_previous_snapshot() {
        let (settler, store, token) = settler(100);
        let player = addr('a');
        settler.settle(&session(&player, 120)).await;

        token.set_balance_unavailable(true);
        let outcome = settler.settle(&session(&player, 130)).await;
        assert!(outcome.success);

        let entry = store.leaderboard_entry(&player).await.unwrap().unwrap();
        assert_eq!(entry.high_score, 130);
        assert_eq!(entry.pong_token_count, 120.0);
        assert_eq!(token.raw_balance(&player).await, 250);
    }

    #[tokio::test]
    async fn test_concurrent_settlements_pay_referee_bonus_once() {
        let (settler, store, token) = settler(100);
        let (referrer, referee) = (addr('a'), addr('b'));
        store.insert_referral(&referrer, &referee).await.unwrap();
        token.set_mint_latency(std::time::Duration::from_millis(50));

        let game = session(&referee, 120);
        let (first, second) = tokio::join!(settler.settle(&game), settler.settle(&game));
        assert!(first.success && second.success);

        let noted = [&first, &second]
            .iter()
            .filter(|outcome| outcome.message.contains(REFEREE_BONUS_NOTE))
            .count();
        assert_eq!(noted, 1);

        let referee_mints: Vec<u64> = token
            .mints()
            .await
            .into_iter()
            .filter(|mint| mint.to == referee)
            .map(|mint| mint.amount)
            .collect();
        assert_eq!(referee_mints, vec![240, 120]);
        assert_eq!(token.raw_balance(&referrer).await, 360);
        assert!(settler.in_flight.is_empty());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("score mismatch"), "Score mismatch");
        assert_eq!(capitalize(""), "");
    }
}
