//! Session Validator
//!
//! Decides whether a reported session is mathematically consistent with the
//! scoring curve and physically plausible. Checks run in a fixed order and the
//! first failure is returned:
//!
//! 1. Positive duration
//! 2. Freshness (anti-replay) and clock skew
//! 3. Non-negative bounce count and a score matching the exact capped summation
//! 4. Bounce rate within the configured maximum

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::score::{MultiplierCurve, SCORE_TOLERANCE};
use crate::game::session::Session;

/// Source of the current time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Rate and freshness limits applied to every session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationLimits {
    /// Highest bounce rate a human rally can reach
    pub max_bounces_per_second: f64,
    /// How long after the round ended it may still be submitted
    pub max_staleness_ms: i64,
    /// How far in the future an end time may lie before it is rejected.
    /// `i64::MAX` disables the check.
    pub max_clock_skew_ms: i64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_bounces_per_second: 5.0,
            max_staleness_ms: 60_000,
            max_clock_skew_ms: 5_000,
        }
    }
}

/// Why a session was rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationFailure {
    /// End time is not after start time
    NonPositiveDuration { start_time_ms: i64, end_time_ms: i64 },
    /// Submitted too long after the round ended
    Stale { age_ms: i64, max_staleness_ms: i64 },
    /// End time lies in the future beyond the allowed skew
    EndsInFuture { ahead_ms: i64, max_clock_skew_ms: i64 },
    /// Bounce count below zero
    NegativeBounceCount { bounce_count: i64 },
    /// Claimed score does not match the bounce count
    ScoreMismatch { expected: f64, claimed: f64 },
    /// More bounces than the elapsed time allows
    BounceRateExceeded {
        bounce_count: i64,
        max_allowed: f64,
        elapsed_seconds: f64,
    },
}

impl ValidationFailure {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationFailure::NonPositiveDuration { .. } => "non_positive_duration",
            ValidationFailure::Stale { .. } => "stale_session",
            ValidationFailure::EndsInFuture { .. } => "ends_in_future",
            ValidationFailure::NegativeBounceCount { .. } => "negative_bounce_count",
            ValidationFailure::ScoreMismatch { .. } => "score_mismatch",
            ValidationFailure::BounceRateExceeded { .. } => "bounce_rate_exceeded",
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::NonPositiveDuration {
                start_time_ms,
                end_time_ms,
            } => write!(
                f,
                "start time {} must be before end time {}",
                start_time_ms, end_time_ms
            ),
            ValidationFailure::Stale {
                age_ms,
                max_staleness_ms,
            } => write!(
                f,
                "session ended {}ms ago, limit is {}ms",
                age_ms, max_staleness_ms
            ),
            ValidationFailure::EndsInFuture {
                ahead_ms,
                max_clock_skew_ms,
            } => write!(
                f,
                "session ends {}ms in the future, limit is {}ms",
                ahead_ms, max_clock_skew_ms
            ),
            ValidationFailure::NegativeBounceCount { bounce_count } => {
                write!(f, "bounce count {} must not be negative", bounce_count)
            }
            ValidationFailure::ScoreMismatch { expected, claimed } => write!(
                f,
                "expected score approximately {:.4}, but got {:.4}",
                expected, claimed
            ),
            ValidationFailure::BounceRateExceeded {
                bounce_count,
                max_allowed,
                elapsed_seconds,
            } => write!(
                f,
                "bounce count {} exceeds maximum allowed {} for elapsed time {}s",
                bounce_count, max_allowed, elapsed_seconds
            ),
        }
    }
}

/// Validate a session against the curve and limits at time `now_ms`
pub fn validate_session(
    session: &Session,
    curve: &MultiplierCurve,
    limits: &ValidationLimits,
    now_ms: i64,
) -> Result<(), ValidationFailure> {
    // Check 1: duration
    if session.start_time_ms >= session.end_time_ms {
        return Err(ValidationFailure::NonPositiveDuration {
            start_time_ms: session.start_time_ms,
            end_time_ms: session.end_time_ms,
        });
    }

    // Check 2: freshness
    let age_ms = now_ms.saturating_sub(session.end_time_ms);
    if age_ms > limits.max_staleness_ms {
        return Err(ValidationFailure::Stale {
            age_ms,
            max_staleness_ms: limits.max_staleness_ms,
        });
    }
    if -age_ms > limits.max_clock_skew_ms {
        return Err(ValidationFailure::EndsInFuture {
            ahead_ms: -age_ms,
            max_clock_skew_ms: limits.max_clock_skew_ms,
        });
    }

    // Check 3: score consistency. NaN never passes the comparison.
    if session.bounce_count < 0 {
        return Err(ValidationFailure::NegativeBounceCount {
            bounce_count: session.bounce_count,
        });
    }
    // Summing past the claim cannot change the verdict.
    let ceiling = if session.claimed_score.is_finite() {
        session.claimed_score + SCORE_TOLERANCE
    } else {
        0.0
    };
    let expected = curve.expected_score_within(session.bounce_count, ceiling);
    let consistent = (session.claimed_score - expected).abs() < SCORE_TOLERANCE;
    if !consistent {
        return Err(ValidationFailure::ScoreMismatch {
            expected,
            claimed: session.claimed_score,
        });
    }

    // Check 4: bounce rate
    let elapsed_seconds = session.elapsed_seconds();
    let max_allowed = elapsed_seconds * limits.max_bounces_per_second;
    if session.bounce_count as f64 > max_allowed {
        return Err(ValidationFailure::BounceRateExceeded {
            bounce_count: session.bounce_count,
            max_allowed,
            elapsed_seconds,
        });
    }

    Ok(())
}

/// Validator bound to the process-wide curve, limits and a clock
#[derive(Debug, Clone)]
pub struct SessionValidator<C = SystemClock> {
    curve: MultiplierCurve,
    limits: ValidationLimits,
    clock: C,
}

impl SessionValidator<SystemClock> {
    pub fn new(curve: MultiplierCurve, limits: ValidationLimits) -> Self {
        Self::with_clock(curve, limits, SystemClock)
    }
}

impl<C: Clock> SessionValidator<C> {
    pub fn with_clock(curve: MultiplierCurve, limits: ValidationLimits, clock: C) -> Self {
        Self {
            curve,
            limits,
            clock,
        }
    }

    pub fn validate(&self, session: &Session) -> Result<(), ValidationFailure> {
        validate_session(session, &self.curve, &self.limits, self.clock.now_ms())
    }

    pub fn curve(&self) -> &MultiplierCurve {
        &self.curve
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::WalletAddress;

    const NOW: i64 = 1_700_000_000_000;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0
        }
    }

    fn session(start: i64, end: i64, count: i64, score: f64) -> Session {
        Session {
            user_id: WalletAddress::parse("0x1111111111111111111111111111111111111111").unwrap(),
            start_time_ms: start,
            end_time_ms: end,
            bounce_count: count,
            claimed_score: score,
        }
    }

    fn validator() -> SessionValidator<FixedClock> {
        SessionValidator::with_clock(
            MultiplierCurve::new(0.05, None),
            ValidationLimits::default(),
            FixedClock(NOW),
        )
    }

    #[test]
    fn test_valid_session() {
        let s = session(NOW - 10_000, NOW - 100, 10, 13.2068);
        assert_eq!(validator().validate(&s), Ok(()));
    }

    #[test]
    fn test_zero_length_always_rejected() {
        for (count, score) in [(0, 0.0), (10, 13.2068), (1_000, 5.0)] {
            let s = session(NOW - 500, NOW - 500, count, score);
            let err = validator().validate(&s).unwrap_err();
            assert_eq!(err.code(), "non_positive_duration");
        }
        let reversed = session(NOW, NOW - 1_000, 0, 0.0);
        assert!(matches!(
            validator().validate(&reversed),
            Err(ValidationFailure::NonPositiveDuration { .. })
        ));
    }

    #[test]
    fn test_stale_session_rejected_even_if_consistent() {
        let limits = ValidationLimits::default();
        let end = NOW - limits.max_staleness_ms - 1;
        let s = session(end - 10_000, end, 10, 13.2068);
        assert!(matches!(
            validator().validate(&s),
            Err(ValidationFailure::Stale { .. })
        ));

        // Exactly at the limit is still fresh
        let end = NOW - limits.max_staleness_ms;
        let s = session(end - 10_000, end, 10, 13.2068);
        assert!(validator().validate(&s).is_ok());
    }

    #[test]
    fn test_future_end_time_rejected() {
        let s = session(NOW, NOW + 60_000, 10, 13.2068);
        assert_eq!(validator().validate(&s).unwrap_err().code(), "ends_in_future");
    }

    #[test]
    fn test_tampered_score_rejected() {
        let s = session(NOW - 10_000, NOW, 10, 14.0);
        match validator().validate(&s) {
            Err(ValidationFailure::ScoreMismatch { expected, claimed }) => {
                assert!((expected - 13.2068).abs() < 0.001);
                assert_eq!(claimed, 14.0);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let nan = session(NOW - 10_000, NOW, 10, f64::NAN);
        assert_eq!(validator().validate(&nan).unwrap_err().code(), "score_mismatch");
    }

    #[test]
    fn test_negative_bounce_count_rejected() {
        let s = session(NOW - 10_000, NOW, -5, 0.0);
        assert_eq!(
            validator().validate(&s),
            Err(ValidationFailure::NegativeBounceCount { bounce_count: -5 })
        );
    }

    #[test]
    fn test_huge_bounce_count_rejected_quickly() {
        let validator = SessionValidator::with_clock(
            MultiplierCurve::new(1e-12, None),
            ValidationLimits::default(),
            FixedClock(NOW),
        );
        let s = session(0, NOW, 1_000_000_000_000_000, 5.0);
        assert_eq!(validator.validate(&s).unwrap_err().code(), "score_mismatch");

        let inf = session(0, NOW, 1_000_000_000_000_000, f64::INFINITY);
        assert_eq!(validator.validate(&inf).unwrap_err().code(), "score_mismatch");
    }

    #[test]
    fn test_clock_skew_check_can_be_disabled() {
        let limits = ValidationLimits {
            max_clock_skew_ms: i64::MAX,
            ..ValidationLimits::default()
        };
        let validator =
            SessionValidator::with_clock(MultiplierCurve::new(0.05, None), limits, FixedClock(NOW));
        let s = session(NOW, NOW + 3_600_000, 10, 13.2068);
        assert!(validator.validate(&s).is_ok());
    }

    #[test]
    fn test_bounce_rate_limit() {
        // 10 bounces in 1 second at 5/s is impossible
        let s = session(NOW - 1_000, NOW, 10, 13.2068);
        assert_eq!(
            validator().validate(&s).unwrap_err().code(),
            "bounce_rate_exceeded"
        );

        // 10 bounces in 2 seconds is exactly the limit
        let s = session(NOW - 2_000, NOW, 10, 13.2068);
        assert!(validator().validate(&s).is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        // Stale and tampered: stale is reported
        let s = session(NOW - 500_000, NOW - 400_000, 10, 99.0);
        assert_eq!(validator().validate(&s).unwrap_err().code(), "stale_session");
    }

    #[test]
    fn test_failure_messages() {
        let err = ValidationFailure::ScoreMismatch {
            expected: 13.20679,
            claimed: 20.0,
        };
        assert!(err.to_string().contains("13.2068"));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["reason"], "score_mismatch");
    }
}
