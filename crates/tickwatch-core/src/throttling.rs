use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::provider_policy::ProviderPolicy;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-provider request budget. Exhaustion is reported to the caller instead
/// of waited out, so the fetcher's backoff stays the only place that sleeps.
#[derive(Clone)]
pub struct ThrottlingQueue {
    limiter: Arc<DirectRateLimiter>,
    replenish_every: Duration,
}

impl std::fmt::Debug for ThrottlingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottlingQueue")
            .field("replenish_every", &self.replenish_every)
            .finish_non_exhaustive()
    }
}

impl ThrottlingQueue {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let (quota, replenish_every) = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            replenish_every,
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(policy.quota_window, policy.quota_limit)
    }

    /// Takes one unit of budget, or returns how long until one replenishes.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter.check().map_err(|_| self.replenish_every)
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> (Quota, Duration) {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);
    (quota, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_burst_is_spent() {
        let queue = ThrottlingQueue::new(Duration::from_secs(60), 2);

        assert!(queue.acquire().is_ok());
        assert!(queue.acquire().is_ok());

        let wait = queue.acquire().expect_err("third request exceeds the quota");
        assert_eq!(wait, Duration::from_secs(30));
    }

    #[test]
    fn zero_limit_is_treated_as_one() {
        let queue = ThrottlingQueue::new(Duration::from_secs(10), 0);

        assert!(queue.acquire().is_ok());
        assert!(queue.acquire().is_err());
    }
}
