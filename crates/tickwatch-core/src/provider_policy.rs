use std::time::Duration;

use serde::Serialize;

use crate::ProviderId;

/// Request quota a provider tolerates before it starts throttling us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl ProviderPolicy {
    pub fn boursorama_default() -> Self {
        Self {
            provider_id: ProviderId::Boursorama,
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
        }
    }

    pub fn marketwatch_default() -> Self {
        Self {
            provider_id: ProviderId::Marketwatch,
            quota_window: Duration::from_secs(60),
            quota_limit: 20,
        }
    }

    /// Providers without a known quota rely on pacing alone.
    pub fn default_for(provider_id: ProviderId) -> Option<Self> {
        match provider_id {
            ProviderId::Boursorama => Some(Self::boursorama_default()),
            ProviderId::Marketwatch => Some(Self::marketwatch_default()),
            ProviderId::Google | ProviderId::Yahoo => None,
        }
    }
}
