//! Score Model
//!
//! Every successful bounce in a rally is worth `(1 + growth_rate)^i` points,
//! where `i` is the 1-based position of the bounce in the rally. An optional cap
//! bounds the per-bounce multiplier so long rallies cannot run away.
//!
//! The client computes the same numbers for display; only the server's result is
//! authoritative.

use serde::{Deserialize, Serialize};

/// Maximum absolute difference between a claimed and an expected score
pub const SCORE_TOLERANCE: f64 = 0.001;

/// Growth rate used by the live game unless configured otherwise
pub const DEFAULT_GROWTH_RATE: f64 = 0.05;

/// Process-wide scoring curve, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierCurve {
    /// Per-bounce growth of the multiplier (>= 0)
    pub growth_rate: f64,
    /// Upper bound on the per-bounce multiplier
    pub multiplier_cap: Option<f64>,
}

impl Default for MultiplierCurve {
    fn default() -> Self {
        Self {
            growth_rate: DEFAULT_GROWTH_RATE,
            multiplier_cap: None,
        }
    }
}

impl MultiplierCurve {
    pub fn new(growth_rate: f64, multiplier_cap: Option<f64>) -> Self {
        Self {
            growth_rate,
            multiplier_cap,
        }
    }

    pub fn expected_score(&self, bounce_count: i64) -> f64 {
        expected_score(bounce_count, self.growth_rate, self.multiplier_cap)
    }

    /// Like [`expected_score`](Self::expected_score), but stops summing as soon as
    /// the running total exceeds `ceiling`. The result is then a lower bound
    /// that is already greater than `ceiling`.
    pub fn expected_score_within(&self, bounce_count: i64, ceiling: f64) -> f64 {
        sum_multipliers(bounce_count, self.growth_rate, self.multiplier_cap, ceiling)
    }

    pub fn multiplier_at(&self, bounce_count: i64) -> f64 {
        multiplier_at(bounce_count, self.growth_rate, self.multiplier_cap)
    }
}

/// Instantaneous multiplier after `bounce_count` consecutive bounces.
///
/// Returns 1 for an empty rally.
pub fn multiplier_at(bounce_count: i64, growth_rate: f64, cap: Option<f64>) -> f64 {
    if bounce_count <= 0 {
        return 1.0;
    }
    apply_cap((1.0 + growth_rate).powf(bounce_count as f64), cap)
}

/// Cumulative score of a rally of `bounce_count` bounces.
///
/// Sums the capped per-bounce multipliers term by term. The geometric-series
/// closed form is only equivalent while no term has been clamped, so it is not
/// used here.
pub fn expected_score(bounce_count: i64, growth_rate: f64, cap: Option<f64>) -> f64 {
    sum_multipliers(bounce_count, growth_rate, cap, f64::INFINITY)
}

fn sum_multipliers(bounce_count: i64, growth_rate: f64, cap: Option<f64>, ceiling: f64) -> f64 {
    if bounce_count <= 0 {
        return 0.0;
    }
    if growth_rate == 0.0 {
        return bounce_count as f64;
    }

    let base = 1.0 + growth_rate;
    let mut total = 0.0;

    for i in 1..=bounce_count {
        let raw = base.powf(i as f64);

        // Once a term is clamped every later term is clamped too.
        if let Some(cap) = cap
            && raw >= cap
        {
            let remaining = (bounce_count - i + 1) as f64;
            return total + cap * remaining;
        }

        if !raw.is_finite() {
            return f64::INFINITY;
        }

        total += raw;
        if total > ceiling {
            return total;
        }
    }

    total
}

fn apply_cap(value: f64, cap: Option<f64>) -> f64 {
    match cap {
        Some(cap) => value.min(cap),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rally() {
        for count in [-5, -1, 0] {
            assert_eq!(expected_score(count, 0.05, None), 0.0);
            assert_eq!(multiplier_at(count, 0.05, None), 1.0);
            assert_eq!(multiplier_at(count, 0.05, Some(1.5)), 1.0);
        }
    }

    #[test]
    fn test_zero_growth_is_one_point_per_bounce() {
        for count in [1, 7, 250] {
            assert_eq!(expected_score(count, 0.0, None), count as f64);
        }
        assert_eq!(multiplier_at(40, 0.0, None), 1.0);
    }

    #[test]
    fn test_ten_bounces_at_five_percent() {
        let score = expected_score(10, 0.05, None);
        assert!((score - 13.2068).abs() < SCORE_TOLERANCE, "got {}", score);
    }

    #[test]
    fn test_matches_closed_form_without_cap() {
        let rate = 0.05;
        let n = 37;
        let closed = ((1.0f64 + rate).powi(n + 1) - (1.0 + rate)) / rate;
        assert!((expected_score(n as i64, rate, None) - closed).abs() < 1e-6);
    }

    #[test]
    fn test_strictly_increasing() {
        let curve = MultiplierCurve::new(0.05, None);
        let mut previous = curve.expected_score(0);
        for n in 1..200 {
            let next = curve.expected_score(n);
            assert!(next > previous, "score did not grow at {}", n);
            previous = next;
        }
    }

    #[test]
    fn test_cap_clamps_later_terms() {
        // 1.5, 2.25, then 3.375 -> 3.0, 5.06 -> 3.0
        let score = expected_score(4, 0.5, Some(3.0));
        assert!((score - (1.5 + 2.25 + 3.0 + 3.0)).abs() < 1e-9);
        assert_eq!(multiplier_at(4, 0.5, Some(3.0)), 3.0);
        assert!((multiplier_at(2, 0.5, Some(3.0)) - 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_capped_long_rally_is_linear_tail() {
        let cap = 2.0;
        let short = expected_score(1_000, 0.05, Some(cap));
        let long = expected_score(1_000_000, 0.05, Some(cap));
        assert!((long - short - cap * 999_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_summation_stops_past_ceiling() {
        let curve = MultiplierCurve::new(1e-12, None);
        // Would take ~1e15 iterations to finish
        let partial = curve.expected_score_within(1_000_000_000_000_000, 10.0);
        assert!(partial > 10.0 && partial < 12.0, "got {}", partial);

        let full = curve.expected_score_within(10, 1_000.0);
        assert_eq!(full, curve.expected_score(10));
    }

    #[test]
    fn test_uncapped_overflow_is_infinite() {
        assert!(expected_score(100_000, 0.5, None).is_infinite());
    }
}
