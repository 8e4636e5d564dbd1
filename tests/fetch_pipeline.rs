use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tickwatch_core::{
    FetchError, FetchErrorKind, FetchOutcome, HttpResponse, Pacer, PacingScope, PriceReading,
    PriceSource, ProviderId, ScriptedHttpClient, SourceRouter, SourceRouterBuilder, SourceStrategy,
    Symbol,
};
use tickwatch_tests::symbol;
use tokio::time::Instant;

type CallLog = Arc<Mutex<Vec<ProviderId>>>;

/// Scripted source that appends its id to a shared call log on every fetch.
struct FakeSource {
    id: ProviderId,
    script: Mutex<Vec<Result<Decimal, FetchError>>>,
    supports_isin: bool,
    log: CallLog,
}

impl FakeSource {
    fn new(id: ProviderId, script: Vec<Result<Decimal, FetchError>>, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(script),
            supports_isin: true,
            log: Arc::clone(log),
        })
    }

    fn ticker_only(id: ProviderId, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(vec![Ok(dec!(1))]),
            supports_isin: false,
            log: Arc::clone(log),
        })
    }
}

impl PriceSource for FakeSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn supports(&self, symbol: &Symbol) -> bool {
        self.supports_isin || !symbol.is_isin()
    }

    fn fetch_price<'a>(
        &'a self,
        _symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<PriceReading, FetchError>> + Send + 'a>> {
        self.log.lock().expect("call log").push(self.id);
        let next = {
            let mut script = self.script.lock().expect("script");
            if script.len() > 1 {
                script.remove(0)
            } else {
                script
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Err(FetchError::internal("empty script")))
            }
        };
        Box::pin(async move {
            next.map(|price| PriceReading {
                raw: price.to_string(),
                price,
                currency: String::from("EUR"),
            })
        })
    }
}

fn calls(log: &CallLog) -> Vec<ProviderId> {
    log.lock().expect("call log").clone()
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_falls_back_and_stops_at_first_success() {
    let log = CallLog::default();
    let router = SourceRouter::new(vec![
        FakeSource::new(
            ProviderId::Google,
            vec![Err(FetchError::not_found("quote page missing"))],
            &log,
        ),
        FakeSource::new(ProviderId::Marketwatch, vec![Ok(dec!(259.60))], &log),
        FakeSource::new(ProviderId::Yahoo, vec![Ok(dec!(999))], &log),
    ]);
    let strategy = SourceStrategy::Priority(vec![
        ProviderId::Google,
        ProviderId::Marketwatch,
        ProviderId::Yahoo,
    ]);

    let outcome = router
        .fetch(&symbol("AAPL"), &strategy, &Pacer::unpaced())
        .await;

    let FetchOutcome::Success(success) = outcome else {
        panic!("second source should succeed");
    };
    assert_eq!(success.quote.price, dec!(259.60));
    assert_eq!(success.quote.source, ProviderId::Marketwatch);
    assert_eq!(calls(&log), vec![ProviderId::Google, ProviderId::Marketwatch]);
    assert_eq!(success.attempts.len(), 2);
    assert_eq!(
        success.attempts[0].error.as_ref().map(FetchError::kind),
        Some(FetchErrorKind::NotFound)
    );
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_with_exponential_backoff() {
    let log = CallLog::default();
    let router = SourceRouter::new(vec![FakeSource::new(
        ProviderId::Google,
        vec![
            Err(FetchError::timeout("request timed out")),
            Err(FetchError::rate_limited("status 429")),
            Ok(dec!(210)),
        ],
        &log,
    )]);
    let started = Instant::now();

    let outcome = router
        .fetch(
            &symbol("AAPL"),
            &SourceStrategy::Strict(ProviderId::Google),
            &Pacer::unpaced(),
        )
        .await;

    let FetchOutcome::Success(success) = outcome else {
        panic!("third attempt should succeed");
    };
    assert_eq!(success.retries(), 2);
    let delays = success
        .attempts
        .iter()
        .map(|record| record.backoff_before)
        .collect::<Vec<_>>();
    assert_eq!(
        delays,
        vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(calls(&log).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn isin_tries_regional_source_before_explicit_order() {
    let log = CallLog::default();
    let router = SourceRouter::new(vec![
        FakeSource::new(ProviderId::Google, vec![Ok(dec!(612.4))], &log),
        FakeSource::new(ProviderId::Marketwatch, vec![Ok(dec!(612.4))], &log),
        FakeSource::new(
            ProviderId::Boursorama,
            vec![Err(FetchError::price_not_found("no price element"))],
            &log,
        ),
    ]);
    let strategy = SourceStrategy::Priority(vec![
        ProviderId::Google,
        ProviderId::Marketwatch,
        ProviderId::Boursorama,
    ]);
    let isin = symbol("FR0000121014");

    assert_eq!(
        router.plan_sources(&isin, &strategy),
        vec![ProviderId::Boursorama, ProviderId::Google, ProviderId::Marketwatch]
    );

    let outcome = router.fetch(&isin, &strategy, &Pacer::unpaced()).await;

    assert!(outcome.is_success());
    assert_eq!(calls(&log), vec![ProviderId::Boursorama, ProviderId::Google]);
}

#[tokio::test(start_paused = true)]
async fn unsupported_sources_are_skipped_without_calls_or_pacing() {
    let log = CallLog::default();
    let router = SourceRouter::new(vec![
        FakeSource::ticker_only(ProviderId::Google, &log),
        FakeSource::new(ProviderId::Boursorama, vec![Ok(dec!(612.4))], &log),
    ]);
    let pacer = Pacer::new(Duration::from_secs(3), PacingScope::Global);
    let strategy = SourceStrategy::Priority(vec![ProviderId::Google, ProviderId::Boursorama]);
    let started = Instant::now();

    // "DE" has no regional source, so Google stays first and is skipped.
    let outcome = router.fetch(&symbol("DE0007164600"), &strategy, &pacer).await;

    let FetchOutcome::Success(success) = outcome else {
        panic!("boursorama should answer");
    };
    assert_eq!(calls(&log), vec![ProviderId::Boursorama]);
    assert_eq!(success.source_chain, vec![ProviderId::Google, ProviderId::Boursorama]);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn exhausted_sources_collect_one_error_each() {
    let log = CallLog::default();
    let router = SourceRouter::new(vec![
        FakeSource::new(ProviderId::Google, vec![Err(FetchError::upstream("status 502"))], &log),
        FakeSource::new(ProviderId::Yahoo, vec![Err(FetchError::not_found("status 404"))], &log),
    ]);
    let strategy = SourceStrategy::Priority(vec![ProviderId::Google, ProviderId::Yahoo]);

    let outcome = router
        .fetch(&symbol("NOPE"), &strategy, &Pacer::unpaced())
        .await;

    let FetchOutcome::Failure(failure) = outcome else {
        panic!("every source fails");
    };
    assert_eq!(failure.symbol, "NOPE");
    assert_eq!(
        failure.errors.iter().map(FetchError::kind).collect::<Vec<_>>(),
        vec![FetchErrorKind::Upstream, FetchErrorKind::NotFound]
    );
    // Three tries on the transient source, one on the permanent one.
    assert_eq!(failure.attempts.len(), 4);
    assert!(failure.summary().contains("sources_exhausted"));
}

#[tokio::test(start_paused = true)]
async fn production_router_resolves_isin_through_boursorama_search() {
    let client = Arc::new(
        ScriptedHttpClient::new()
            .respond(
                "https://www.boursorama.com/recherche/",
                Ok(HttpResponse::ok(r#"<a href="/cours/1rPMC/">LVMH</a>"#)),
            )
            .respond(
                "https://www.boursorama.com/cours/1rPMC/",
                Ok(HttpResponse::ok(
                    r#"<span class="c-instrument c-instrument--last">612,40</span>"#,
                )),
            ),
    );
    let router = SourceRouterBuilder::new()
        .with_http_client(client.clone())
        .build();

    let outcome = router
        .fetch(&symbol("FR0000121014"), &SourceStrategy::Auto, &Pacer::unpaced())
        .await;

    let FetchOutcome::Success(success) = outcome else {
        panic!("isin should resolve on boursorama");
    };
    assert_eq!(success.quote.source, ProviderId::Boursorama);
    assert_eq!(success.quote.price, dec!(612.40));
    assert_eq!(success.quote.currency, "EUR");
    assert_eq!(client.recorded_requests().len(), 2);
}
