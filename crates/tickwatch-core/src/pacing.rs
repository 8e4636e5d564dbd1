use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::ProviderId;

/// Which operations share a pacing gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingScope {
    /// One gap between any two network operations, whatever the provider.
    Global,
    /// One gap per provider; different providers may run back to back.
    PerProvider,
}

/// Minimum spacing between network-issuing operations.
///
/// Callers reserve a slot before any I/O. The first reservation is granted
/// immediately; each later one is granted `interval` after the previous
/// grant in the same scope. Reservations are handed out in call order, so
/// concurrent workers queue fairly instead of racing on a shared timestamp.
///
/// A pacer lives for one batch run.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    scope: PacingScope,
    next_slot: Mutex<HashMap<Option<ProviderId>, Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration, scope: PacingScope) -> Self {
        Self {
            interval,
            scope,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Pacer that never waits.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO, PacingScope::Global)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn scope(&self) -> PacingScope {
        self.scope
    }

    /// Wait for the next slot of `provider`'s scope; returns the time waited.
    pub async fn reserve(&self, provider: ProviderId) -> Duration {
        if self.interval.is_zero() {
            return Duration::ZERO;
        }

        let key = match self.scope {
            PacingScope::Global => None,
            PacingScope::PerProvider => Some(provider),
        };

        let now = Instant::now();
        let slot = {
            let mut next_slot = self
                .next_slot
                .lock()
                .expect("pacing table should not be poisoned");
            let slot = next_slot
                .get(&key)
                .copied()
                .filter(|slot| *slot > now)
                .unwrap_or(now);
            let following = slot.checked_add(self.interval).unwrap_or(slot);
            next_slot.insert(key, following);
            slot
        };

        if slot > now {
            tracing::debug!(
                provider = %provider,
                wait_ms = (slot - now).as_millis() as u64,
                "pacing before request"
            );
            tokio::time::sleep_until(slot).await;
        }

        slot - now
    }
}
