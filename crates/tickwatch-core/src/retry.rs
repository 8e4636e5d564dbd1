//! Per-adapter retry policy with exponential backoff and optional jitter.

use std::time::Duration;

/// Backoff strategy between attempts on the same adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// Delay is `base * factor^retry`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        /// Apply +/- 50% random jitter to the capped delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based: the wait after the first
    /// failed attempt is `delay(0)`).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(i32::try_from(retry).unwrap_or(i32::MAX));
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds.max(0.0));

                if jitter {
                    apply_jitter(delay)
                } else {
                    delay
                }
            }
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    let spread = millis / 2;
    let offset = fastrand::u64(0..=spread.saturating_mul(2));
    Duration::from_millis((millis - spread).saturating_add(offset))
}

/// Retry budget applied by the fetcher to each adapter independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per adapter, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base: Duration, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential {
                base,
                factor: 2.0,
                max: base.saturating_mul(4),
                jitter,
            },
        }
    }

    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Single attempt per adapter.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait before `attempt` (1-based); `None` for the first attempt
    /// or when the budget is exhausted.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 || attempt > self.max_attempts {
            return None;
        }
        Some(self.backoff.delay(attempt - 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_waits_one_then_two_seconds() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_before(4), None);
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn fixed_backoff_ignores_retry_number() {
        let policy = RetryPolicy::fixed(Duration::from_millis(250), 4);

        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_millis(250)));
    }

    #[test]
    fn jitter_stays_within_half_of_the_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(1_000),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: true,
        };

        for _ in 0..20 {
            for retry in 0..3 {
                let expected = 1_000_u128 << retry;
                let delay = backoff.delay(retry).as_millis();
                assert!(delay >= expected / 2, "retry={retry}, delay={delay}");
                assert!(delay <= expected * 3 / 2, "retry={retry}, delay={delay}");
            }
        }
    }

    #[test]
    fn no_retry_allows_a_single_attempt() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_before(2), None);
    }
}
