//! Multi-source fetch: adapter ordering, per-adapter retry with backoff and
//! first-success-wins fallback.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::time::Instant;

use crate::adapters::{BoursoramaAdapter, GoogleFinanceAdapter, MarketWatchAdapter, YahooChartAdapter};
use crate::data_source::{FetchError, PriceSource};
use crate::http_client::{HttpClient, ReqwestHttpClient, DEFAULT_TIMEOUT_MS};
use crate::pacing::Pacer;
use crate::provider_policy::ProviderPolicy;
use crate::retry::RetryPolicy;
use crate::throttling::ThrottlingQueue;
use crate::{ProviderId, Quote, Symbol, UtcDateTime, ValidationError};

/// Source selection strategy for routing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceStrategy {
    /// Default priority table with regional promotion.
    #[default]
    Auto,
    /// Caller-supplied order (deduplicated) with regional promotion.
    Priority(Vec<ProviderId>),
    /// Exactly one source, no fallback.
    Strict(ProviderId),
}

impl SourceStrategy {
    fn is_strict(&self) -> bool {
        matches!(self, Self::Strict(_))
    }
}

impl FromStr for SourceStrategy {
    type Err = ValidationError;

    /// `auto`, or a provider name for a strict single-source strategy.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        value.parse::<ProviderId>().map(Self::Strict)
    }
}

impl Display for SourceStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Priority(order) => {
                let names = order.iter().map(|p| p.as_str()).collect::<Vec<_>>();
                write!(f, "priority({})", names.join(","))
            }
            Self::Strict(provider) => write!(f, "strict({provider})"),
        }
    }
}

/// One adapter invocation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider: ProviderId,
    /// 1-based attempt number on this provider.
    pub attempt: u32,
    /// `None` when the attempt produced the quote.
    pub error: Option<FetchError>,
    /// Backoff slept before this attempt; zero for first attempts.
    #[serde(rename = "backoff_before_ms", serialize_with = "serialize_millis")]
    pub backoff_before: Duration,
}

/// Why a symbol produced no quote this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Every planned source failed or was skipped.
    SourcesExhausted,
    /// The cycle deadline passed before the fetch finished or started.
    TimedOut,
    /// The watchlist entry was rejected before any fetch.
    InvalidConfig,
}

impl FailureReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourcesExhausted => "sources_exhausted",
            Self::TimedOut => "timed_out",
            Self::InvalidConfig => "invalid_config",
        }
    }
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchSuccess {
    pub quote: Quote,
    pub source_chain: Vec<ProviderId>,
    pub attempts: Vec<AttemptRecord>,
    pub warnings: Vec<String>,
    pub latency_ms: u64,
}

impl FetchSuccess {
    /// Attempts beyond the first on any provider.
    pub fn retries(&self) -> usize {
        self.attempts.iter().filter(|record| record.attempt > 1).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    /// Raw symbol text; rejected watchlist entries may not parse as a symbol.
    pub symbol: String,
    pub reason: FailureReason,
    /// Final error of each source tried, in chain order.
    pub errors: Vec<FetchError>,
    pub attempts: Vec<AttemptRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
}

impl FetchFailure {
    pub fn timed_out(symbol: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            symbol: symbol.into(),
            reason: FailureReason::TimedOut,
            errors: Vec::new(),
            attempts: Vec::new(),
            detail: Some(String::from("cycle deadline reached")),
            latency_ms,
        }
    }

    pub fn invalid_config(symbol: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            reason: FailureReason::InvalidConfig,
            errors: Vec::new(),
            attempts: Vec::new(),
            detail: Some(detail.into()),
            latency_ms: 0,
        }
    }

    /// One-line description for logs and tables.
    pub fn summary(&self) -> String {
        if let Some(detail) = &self.detail {
            return format!("{}: {detail}", self.reason);
        }
        match self.errors.last() {
            Some(error) => format!("{}: {error}", self.reason),
            None => self.reason.to_string(),
        }
    }
}

/// Exactly one of these per symbol per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success(FetchSuccess),
    Failure(FetchFailure),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Success(success) => success.quote.symbol.as_str(),
            Self::Failure(failure) => &failure.symbol,
        }
    }
}

/// Adapter registry and fetch engine.
pub struct SourceRouter {
    adapters: HashMap<ProviderId, Arc<dyn PriceSource>>,
    retry: RetryPolicy,
}

impl SourceRouter {
    pub fn new(adapters: Vec<Arc<dyn PriceSource>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self {
            adapters,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn registered_sources(&self) -> Vec<ProviderId> {
        let mut providers = self.adapters.keys().copied().collect::<Vec<_>>();
        providers.sort();
        providers
    }

    /// Ordered providers to try for `symbol`. Providers whose home region
    /// matches the symbol's region hint move to the front, keeping relative
    /// order otherwise. Strict plans are never reordered.
    pub fn plan_sources(&self, symbol: &Symbol, strategy: &SourceStrategy) -> Vec<ProviderId> {
        let chain = match strategy {
            SourceStrategy::Strict(provider) => return vec![*provider],
            SourceStrategy::Auto => self.auto_chain(),
            SourceStrategy::Priority(priority) => dedupe_chain(priority),
        };

        match symbol.region_hint() {
            Some(region) => promote_region(chain, region),
            None => chain,
        }
    }

    fn auto_chain(&self) -> Vec<ProviderId> {
        let mut chain = ProviderId::DEFAULT_ORDER
            .into_iter()
            .filter(|provider| self.adapters.contains_key(provider))
            .collect::<Vec<_>>();
        for provider in self.registered_sources() {
            if !chain.contains(&provider) {
                chain.push(provider);
            }
        }
        chain
    }

    /// Fetch one quote, trying planned sources in order until one succeeds.
    /// Every pacing wait, backoff sleep and network call happens inside this
    /// future, so dropping it abandons the fetch cleanly.
    pub async fn fetch(
        &self,
        symbol: &Symbol,
        strategy: &SourceStrategy,
        pacer: &Pacer,
    ) -> FetchOutcome {
        let started = Instant::now();
        let planned_chain = self.plan_sources(symbol, strategy);
        let mut source_chain = Vec::with_capacity(planned_chain.len());
        let mut attempts = Vec::new();
        let mut errors = Vec::new();

        for provider in planned_chain {
            source_chain.push(provider);

            let Some(adapter) = self.adapters.get(&provider) else {
                errors.push(
                    FetchError::internal(format!("source adapter '{provider}' is not registered"))
                        .with_provider(provider),
                );
                if strategy.is_strict() {
                    break;
                }
                continue;
            };

            if !adapter.supports(symbol) {
                tracing::debug!(symbol = %symbol, provider = %provider, "source does not support symbol");
                errors.push(FetchError::unsupported_symbol(symbol).with_provider(provider));
                continue;
            }

            match self
                .fetch_with_retry(adapter.as_ref(), symbol, pacer, &mut attempts)
                .await
            {
                Ok(quote) => {
                    let mut warnings = Vec::new();
                    if !errors.is_empty() {
                        warnings.push(format!(
                            "source fallback succeeded with '{provider}' after {} failed source(s)",
                            errors.len()
                        ));
                    }

                    tracing::info!(
                        symbol = %symbol,
                        provider = %provider,
                        price = %quote.price,
                        currency = %quote.currency,
                        failed_sources = errors.len(),
                        "quote fetched"
                    );

                    return FetchOutcome::Success(FetchSuccess {
                        quote,
                        source_chain,
                        attempts,
                        warnings,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(error) => {
                    tracing::info!(
                        symbol = %symbol,
                        provider = %provider,
                        error = %error,
                        "source exhausted, falling back"
                    );
                    errors.push(error);
                }
            }
        }

        if errors.is_empty() {
            errors.push(FetchError::internal(format!(
                "no source candidates available for {symbol}"
            )));
        }

        tracing::warn!(
            symbol = %symbol,
            sources = source_chain.len(),
            attempts = attempts.len(),
            "all sources failed"
        );

        FetchOutcome::Failure(FetchFailure {
            symbol: symbol.to_string(),
            reason: FailureReason::SourcesExhausted,
            errors,
            attempts,
            detail: None,
            latency_ms: elapsed_ms(started),
        })
    }

    /// Run up to `max_attempts` attempts on one adapter. Permanent errors end
    /// the loop early; the last error is returned when the budget runs out.
    async fn fetch_with_retry(
        &self,
        adapter: &dyn PriceSource,
        symbol: &Symbol,
        pacer: &Pacer,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Result<Quote, FetchError> {
        let provider = adapter.id();
        let mut attempt = 1;

        loop {
            let backoff_before = self.retry.delay_before(attempt).unwrap_or(Duration::ZERO);
            if !backoff_before.is_zero() {
                tracing::info!(
                    symbol = %symbol,
                    provider = %provider,
                    attempt,
                    backoff_ms = backoff_before.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(backoff_before).await;
            }

            pacer.reserve(provider).await;
            tracing::debug!(symbol = %symbol, provider = %provider, attempt, "fetching price");

            let result = adapter
                .fetch_price(symbol)
                .await
                .and_then(|reading| {
                    Quote::new(
                        symbol.clone(),
                        reading.price,
                        reading.currency,
                        provider,
                        UtcDateTime::now(),
                    )
                    .map_err(|e| FetchError::internal(format!("invalid quote: {e}")))
                })
                .map_err(|error| error.with_provider(provider));

            attempts.push(AttemptRecord {
                provider,
                attempt,
                error: result.as_ref().err().cloned(),
                backoff_before,
            });

            let error = match result {
                Ok(quote) => return Ok(quote),
                Err(error) => error,
            };

            tracing::warn!(
                symbol = %symbol,
                provider = %provider,
                attempt,
                code = error.code(),
                retryable = error.retryable(),
                error = %error.message(),
                "price fetch attempt failed"
            );

            if !error.retryable() || attempt >= self.retry.max_attempts {
                return Err(error);
            }
            attempt += 1;
        }
    }
}

/// Builder wiring the four production adapters to one shared HTTP client.
pub struct SourceRouterBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    timeout_ms: u64,
    google_exchange: String,
    retry: RetryPolicy,
    enabled: Vec<ProviderId>,
    quotas: bool,
}

impl Default for SourceRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRouterBuilder {
    pub fn new() -> Self {
        Self {
            http_client: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            google_exchange: String::from("NASDAQ"),
            retry: RetryPolicy::default(),
            enabled: ProviderId::ALL.to_vec(),
            quotas: true,
        }
    }

    /// Use `http_client` for every adapter instead of a fresh reqwest client.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_google_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.google_exchange = exchange.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register only these providers.
    pub fn with_sources(mut self, sources: &[ProviderId]) -> Self {
        self.enabled = dedupe_chain(sources);
        self
    }

    /// Enable or disable per-provider request quotas.
    pub fn with_quotas(mut self, enabled: bool) -> Self {
        self.quotas = enabled;
        self
    }

    pub fn build(self) -> SourceRouter {
        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let quota = |provider: ProviderId| {
            ProviderPolicy::default_for(provider)
                .filter(|_| self.quotas)
                .map(|policy| ThrottlingQueue::from_policy(&policy))
        };

        let adapters = self
            .enabled
            .iter()
            .map(|provider| -> Arc<dyn PriceSource> {
                let client = Arc::clone(&http_client);
                match provider {
                    ProviderId::Google => {
                        let adapter = GoogleFinanceAdapter::new(client)
                            .with_default_exchange(self.google_exchange.as_str())
                            .with_timeout_ms(self.timeout_ms);
                        Arc::new(match quota(*provider) {
                            Some(queue) => adapter.with_throttling(queue),
                            None => adapter,
                        })
                    }
                    ProviderId::Marketwatch => {
                        let adapter = MarketWatchAdapter::new(client).with_timeout_ms(self.timeout_ms);
                        Arc::new(match quota(*provider) {
                            Some(queue) => adapter.with_throttling(queue),
                            None => adapter,
                        })
                    }
                    ProviderId::Boursorama => {
                        let adapter = BoursoramaAdapter::new(client).with_timeout_ms(self.timeout_ms);
                        Arc::new(match quota(*provider) {
                            Some(queue) => adapter.with_throttling(queue),
                            None => adapter,
                        })
                    }
                    ProviderId::Yahoo => {
                        let adapter = YahooChartAdapter::new(client).with_timeout_ms(self.timeout_ms);
                        Arc::new(match quota(*provider) {
                            Some(queue) => adapter.with_throttling(queue),
                            None => adapter,
                        })
                    }
                }
            })
            .collect::<Vec<_>>();

        SourceRouter::new(adapters).with_retry_policy(self.retry)
    }
}

fn dedupe_chain(chain: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    let mut output = Vec::with_capacity(chain.len());

    for provider in chain {
        if seen.insert(*provider) {
            output.push(*provider);
        }
    }

    output
}

fn promote_region(chain: Vec<ProviderId>, region: &str) -> Vec<ProviderId> {
    let (regional, rest): (Vec<_>, Vec<_>) = chain
        .into_iter()
        .partition(|provider| provider.home_region() == Some(region));
    regional.into_iter().chain(rest).collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis().min(u128::from(u64::MAX)) as u64)
}
