//! One check cycle over a watchlist.
//!
//! The runner fetches every watchlist symbol through a shared
//! [`SourceRouter`], evaluates each quote against its bounds and collects
//! violations and failures. A symbol that fails never stops the others.
//! Results are reported in watchlist order whatever the completion order.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::config::Settings;
use crate::evaluator::evaluate;
use crate::pacing::{Pacer, PacingScope};
use crate::routing::{
    FailureReason, FetchFailure, FetchOutcome, FetchSuccess, SourceRouter, SourceStrategy,
};
use crate::watchlist::Watchlist;
use crate::{FetchError, Symbol, UtcDateTime, Violation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    pub quotes: Vec<FetchSuccess>,
    pub violations: Vec<Violation>,
    pub failures: Vec<FetchFailure>,
}

impl BatchReport {
    pub fn quote_count(&self) -> usize {
        self.quotes.len()
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Wall-clock length of the cycle.
    pub fn duration(&self) -> Duration {
        self.finished_at.duration_since(self.started_at)
    }
}

pub struct BatchRunner {
    router: Arc<SourceRouter>,
    strategy: SourceStrategy,
    concurrency: usize,
    pacing: Duration,
    cycle_timeout: Option<Duration>,
}

impl BatchRunner {
    /// Sequential runner with 3s pacing and no deadline.
    pub fn new(router: Arc<SourceRouter>) -> Self {
        Self {
            router,
            strategy: SourceStrategy::Auto,
            concurrency: 1,
            pacing: Duration::from_secs(3),
            cycle_timeout: None,
        }
    }

    pub fn from_settings(router: Arc<SourceRouter>, settings: &Settings) -> Self {
        Self::new(router)
            .with_strategy(settings.strategy())
            .with_concurrency(settings.concurrency)
            .with_pacing(settings.pacing_interval())
            .with_cycle_timeout(settings.cycle_timeout())
    }

    pub fn with_strategy(mut self, strategy: SourceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Minimum gap between network operations; zero disables pacing.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_cycle_timeout(mut self, cycle_timeout: Duration) -> Self {
        self.cycle_timeout = Some(cycle_timeout);
        self
    }

    pub fn strategy(&self) -> &SourceStrategy {
        &self.strategy
    }

    fn pacing_scope(&self) -> PacingScope {
        if self.concurrency > 1 {
            PacingScope::PerProvider
        } else {
            PacingScope::Global
        }
    }

    /// Run one cycle: fetch, evaluate, collect.
    pub async fn run(&self, watchlist: &Watchlist) -> BatchReport {
        let started_at = UtcDateTime::now();
        let mut failures = Vec::new();

        for rejected in &watchlist.rejected {
            tracing::warn!(
                symbol = %rejected.symbol,
                error = %rejected.error,
                "skipping invalid watchlist entry"
            );
            failures.push(FetchFailure::invalid_config(
                rejected.symbol.as_str(),
                rejected.error.to_string(),
            ));
        }

        if watchlist.entries.is_empty() {
            tracing::warn!("no stocks configured for tracking");
        }

        let symbols = watchlist
            .entries
            .iter()
            .map(|entry| entry.symbol.clone())
            .collect::<Vec<_>>();
        let outcomes = self.fetch_all(symbols).await;

        let mut quotes = Vec::new();
        let mut violations = Vec::new();

        for (entry, outcome) in watchlist.entries.iter().zip(outcomes) {
            match outcome {
                FetchOutcome::Success(success) => {
                    if let Some(violation) =
                        evaluate(&success.quote, &entry.spec, entry.name.as_deref())
                    {
                        tracing::warn!(
                            symbol = %violation.symbol,
                            kind = %violation.kind,
                            threshold = %violation.threshold,
                            price = %violation.price,
                            "{}",
                            violation.message
                        );
                        violations.push(violation);
                    }
                    quotes.push(success);
                }
                FetchOutcome::Failure(failure) => {
                    tracing::error!(
                        symbol = %failure.symbol,
                        reason = %failure.reason,
                        attempts = failure.attempts.len(),
                        "{}",
                        failure.summary()
                    );
                    failures.push(failure);
                }
            }
        }

        if !violations.is_empty() {
            tracing::warn!("found {} threshold violation(s)", violations.len());
        }
        tracing::info!(
            quotes = quotes.len(),
            violations = violations.len(),
            failures = failures.len(),
            "check cycle finished"
        );

        BatchReport {
            started_at,
            finished_at: UtcDateTime::now(),
            quotes,
            violations,
            failures,
        }
    }

    /// Fetch every symbol once under this runner's pacing, concurrency and
    /// deadline. Returns one outcome per symbol, in input order.
    pub async fn fetch_all(&self, symbols: Vec<Symbol>) -> Vec<FetchOutcome> {
        let started = Instant::now();
        // A deadline past the clock's range is no deadline at all.
        let deadline = self
            .cycle_timeout
            .and_then(|timeout| started.checked_add(timeout));
        let pacer = Arc::new(Pacer::new(self.pacing, self.pacing_scope()));

        if self.concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(symbols.len());
            for symbol in symbols {
                let fetch = self.router.fetch(&symbol, &self.strategy, &pacer);
                outcomes.push(within_deadline(deadline, started, &symbol, fetch).await);
            }
            return outcomes;
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let router = Arc::clone(&self.router);
            let strategy = self.strategy.clone();
            let pacer = Arc::clone(&pacer);
            let permits = Arc::clone(&permits);
            let task_symbol = symbol.clone();

            let handle = tokio::spawn(async move {
                let work = async {
                    let _permit = permits.acquire().await;
                    router.fetch(&task_symbol, &strategy, &pacer).await
                };
                within_deadline(deadline, started, &task_symbol, work).await
            });
            handles.push((symbol, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (symbol, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(error) => worker_failed(&symbol, started, &error.to_string()),
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Await `fetch` unless the cycle deadline passes first. Symbols reached
/// after the deadline are recorded as timed out without any network call.
async fn within_deadline<F>(
    deadline: Option<Instant>,
    started: Instant,
    symbol: &Symbol,
    fetch: F,
) -> FetchOutcome
where
    F: std::future::Future<Output = FetchOutcome>,
{
    let Some(deadline) = deadline else {
        return fetch.await;
    };

    if Instant::now() >= deadline {
        tracing::warn!(symbol = %symbol, "cycle deadline passed, symbol not fetched");
        return FetchOutcome::Failure(FetchFailure::timed_out(symbol.as_str(), 0));
    }

    match tokio::time::timeout_at(deadline, fetch).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(symbol = %symbol, "cycle deadline reached during fetch");
            FetchOutcome::Failure(FetchFailure::timed_out(
                symbol.as_str(),
                elapsed_ms(started),
            ))
        }
    }
}

fn worker_failed(symbol: &Symbol, started: Instant, message: &str) -> FetchOutcome {
    FetchOutcome::Failure(FetchFailure {
        symbol: symbol.to_string(),
        reason: FailureReason::SourcesExhausted,
        errors: vec![FetchError::internal(format!("fetch worker failed: {message}"))],
        attempts: Vec::new(),
        detail: None,
        latency_ms: elapsed_ms(started),
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{PriceReading, PriceSource};
    use crate::ProviderId;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::future::Future;
    use std::pin::Pin;

    /// Answers every symbol after `delay`, with a fixed price.
    struct SlowSource {
        delay: Duration,
        price: Decimal,
    }

    impl PriceSource for SlowSource {
        fn id(&self) -> ProviderId {
            ProviderId::Yahoo
        }

        fn supports(&self, _symbol: &Symbol) -> bool {
            true
        }

        fn fetch_price<'a>(
            &'a self,
            _symbol: &'a Symbol,
        ) -> Pin<Box<dyn Future<Output = Result<PriceReading, FetchError>> + Send + 'a>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                Ok(PriceReading {
                    raw: self.price.to_string(),
                    price: self.price,
                    currency: String::from("USD"),
                })
            })
        }
    }

    fn runner(delay: Duration) -> BatchRunner {
        let source: Arc<dyn PriceSource> = Arc::new(SlowSource {
            delay,
            price: dec!(100),
        });
        BatchRunner::new(Arc::new(SourceRouter::new(vec![source])))
            .with_strategy(SourceStrategy::Strict(ProviderId::Yahoo))
            .with_pacing(Duration::ZERO)
    }

    fn symbols(values: &[&str]) -> Vec<Symbol> {
        values
            .iter()
            .map(|value| Symbol::parse(value).expect("valid symbol"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_results_keep_input_order() {
        let runner = runner(Duration::from_millis(50)).with_concurrency(3);

        let outcomes = runner.fetch_all(symbols(&["AAPL", "MSFT", "KO", "NVDA"])).await;

        let order = outcomes.iter().map(FetchOutcome::symbol).collect::<Vec<_>>();
        assert_eq!(order, vec!["AAPL", "MSFT", "KO", "NVDA"]);
        assert!(outcomes.iter().all(FetchOutcome::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_deadline_and_gap_do_not_abort_the_cycle() {
        let runner = runner(Duration::from_millis(10))
            .with_pacing(Duration::MAX)
            .with_cycle_timeout(Duration::MAX);

        let outcomes = runner.fetch_all(symbols(&["AAPL", "KO"])).await;

        assert!(outcomes.iter().all(FetchOutcome::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_slow_symbols_into_timeouts() {
        let runner = runner(Duration::from_secs(4)).with_cycle_timeout(Duration::from_secs(6));

        let outcomes = runner.fetch_all(symbols(&["AAPL", "MSFT", "KO"])).await;

        assert!(outcomes[0].is_success());
        for outcome in &outcomes[1..] {
            match outcome {
                FetchOutcome::Failure(failure) => {
                    assert_eq!(failure.reason, FailureReason::TimedOut)
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_watchlist_produces_empty_report() {
        let report = runner(Duration::ZERO).run(&Watchlist::default()).await;

        assert_eq!(report.quote_count(), 0);
        assert_eq!(report.violation_count(), 0);
        assert!(!report.has_failures());
    }
}
