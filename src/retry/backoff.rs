//! Exponential backoff with jitter.
//!
//! The calculator is a pure function of the attempt number and two bounds:
//!
//! ```text
//! raw   = base * 2^(attempt - 1)
//! delay = min(raw * factor, cap)      factor ∈ [0.5, 1.0]
//! ```
//!
//! # Examples
//!
//! ```rust
//! use floodgate::retry::backoff;
//! use std::time::Duration;
//!
//! let base = Duration::from_millis(100);
//! let cap = Duration::from_secs(5);
//!
//! let third = backoff::delay(3, base, cap);
//! assert!(third >= Duration::from_millis(200));
//! assert!(third <= Duration::from_millis(400));
//! ```

use std::time::Duration;

use rand::Rng;

/// Lower bound of the jitter factor used by [`JitterStrategy::Equal`].
pub const MIN_JITTER_FACTOR: f64 = 0.5;

/// How randomness is mixed into a backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum JitterStrategy {
    /// No jitter; the delay is exactly `base * 2^(attempt - 1)` (capped).
    None,
    /// Scale the delay by a uniform factor in `[0.5, 1.0]`.
    #[default]
    Equal,
    /// Scale the delay by a uniform factor in `[0.0, 1.0]`.
    Full,
}

impl JitterStrategy {
    /// Draw a scaling factor for one delay.
    pub fn factor(&self) -> f64 {
        match self {
            JitterStrategy::None => 1.0,
            JitterStrategy::Equal => rand::rng().random_range(MIN_JITTER_FACTOR..=1.0),
            JitterStrategy::Full => rand::rng().random_range(0.0..=1.0),
        }
    }
}

/// Un-jittered exponential delay for a 1-based attempt number.
///
/// Attempt `0` is treated as attempt `1`. Saturates instead of overflowing.
pub fn exponential(attempt: u32, base: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1);
    base.saturating_mul(2u32.saturating_pow(exponent))
}

/// Backoff delay for `attempt` with equal jitter, clamped to `cap`.
///
/// The result always lies in `[0.5 * base * 2^(attempt - 1), cap]`, except
/// that a `cap` below the lower bound wins.
pub fn delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    delay_with_factor(attempt, base, cap, JitterStrategy::Equal.factor())
}

/// Backoff delay for `attempt` scaled by an explicit jitter `factor`.
///
/// `factor` is clamped to `[0.0, 1.0]`.
pub fn delay_with_factor(attempt: u32, base: Duration, cap: Duration, factor: f64) -> Duration {
    let factor = if factor.is_nan() {
        1.0
    } else {
        factor.clamp(0.0, 1.0)
    };

    let scaled = exponential(attempt, base).as_nanos() as f64 * factor;
    if scaled >= cap.as_nanos() as f64 {
        cap
    } else {
        Duration::from_nanos(scaled as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exponential_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(exponential(1, base), Duration::from_millis(100));
        assert_eq!(exponential(2, base), Duration::from_millis(200));
        assert_eq!(exponential(3, base), Duration::from_millis(400));
        assert_eq!(exponential(4, base), Duration::from_millis(800));
    }

    #[test]
    fn test_attempt_zero_is_first_attempt() {
        let base = Duration::from_millis(100);
        assert_eq!(exponential(0, base), exponential(1, base));
    }

    #[test]
    fn test_exponential_saturates() {
        let base = Duration::from_millis(100);
        let huge = exponential(200, base);
        assert!(huge >= exponential(30, base));
    }

    #[test]
    fn test_factor_bounds() {
        for _ in 0..200 {
            let equal = JitterStrategy::Equal.factor();
            assert!((MIN_JITTER_FACTOR..=1.0).contains(&equal));

            let full = JitterStrategy::Full.factor();
            assert!((0.0..=1.0).contains(&full));
        }
        assert_eq!(JitterStrategy::None.factor(), 1.0);
    }

    #[test]
    fn test_default_jitter_is_equal() {
        assert_eq!(JitterStrategy::default(), JitterStrategy::Equal);
    }

    #[test]
    fn test_delay_with_factor_exact() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(5);

        assert_eq!(
            delay_with_factor(3, base, cap, 0.5),
            Duration::from_millis(200)
        );
        assert_eq!(
            delay_with_factor(3, base, cap, 1.0),
            Duration::from_millis(400)
        );
    }

    #[test]
    fn test_delay_clamped_to_cap() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_millis(5000);

        // 100 * 2^9 = 51_200ms; even the lowest factor exceeds the cap
        assert_eq!(delay_with_factor(10, base, cap, 0.5), cap);
        assert_eq!(delay(30, base, cap), cap);
    }

    #[test]
    fn test_out_of_range_factor_is_clamped() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(5);

        assert_eq!(delay_with_factor(1, base, cap, 3.0), base);
        assert_eq!(delay_with_factor(1, base, cap, -1.0), Duration::ZERO);
        assert_eq!(delay_with_factor(1, base, cap, f64::NAN), base);
    }

    proptest! {
        #[test]
        fn prop_delay_within_bounds(
            attempt in 1u32..16,
            base_ms in 1u64..1_000,
            cap_ms in 1u64..60_000,
        ) {
            let base = Duration::from_millis(base_ms);
            let cap = Duration::from_millis(cap_ms);
            let raw = exponential(attempt, base);

            let d = delay(attempt, base, cap);

            prop_assert!(d <= cap);
            prop_assert!(d <= raw);
            let lower = raw / 2;
            prop_assert!(d >= lower.min(cap));
        }

        #[test]
        fn prop_lower_bound_non_decreasing(attempt in 1u32..20, base_ms in 1u64..500) {
            let base = Duration::from_millis(base_ms);
            let cap = Duration::from_secs(5);

            let now = delay_with_factor(attempt, base, cap, MIN_JITTER_FACTOR);
            let next = delay_with_factor(attempt + 1, base, cap, MIN_JITTER_FACTOR);
            prop_assert!(next >= now);
        }
    }
}
