use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tickwatch_core::{
    BatchRunner, FailureReason, HttpResponse, ProviderId, ScriptedHttpClient, SourceRouterBuilder,
    SourceStrategy, ThresholdKind, Watchlist,
};
use tokio::time::Instant;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

fn chart(price: &str) -> HttpResponse {
    HttpResponse::ok(format!(
        r#"{{"chart":{{"result":[{{"meta":{{"currency":"USD","regularMarketPrice":{price}}}}}],"error":null}}}}"#
    ))
}

/// Yahoo-only client: AAPL at 210, KO at 61.5, MSFT unknown (404).
fn client() -> Arc<ScriptedHttpClient> {
    Arc::new(
        ScriptedHttpClient::new()
            .respond(format!("{CHART_URL}/AAPL?"), Ok(chart("210.0")))
            .respond(format!("{CHART_URL}/KO?"), Ok(chart("61.5")))
            .respond(format!("{CHART_URL}/NVDA?"), Ok(chart("120.25")))
            .respond(
                format!("{CHART_URL}/MSFT?"),
                Ok(HttpResponse::with_status(404, r#"{"chart":{"result":null}}"#)),
            ),
    )
}

fn runner(client: Arc<ScriptedHttpClient>) -> BatchRunner {
    let router = SourceRouterBuilder::new()
        .with_http_client(client)
        .with_sources(&[ProviderId::Yahoo])
        .build();
    BatchRunner::new(Arc::new(router)).with_strategy(SourceStrategy::Auto)
}

fn watchlist(json: &str) -> Watchlist {
    Watchlist::from_json_str(json).expect("valid watchlist")
}

#[tokio::test(start_paused = true)]
async fn one_failing_symbol_does_not_stop_the_batch() {
    let watchlist = watchlist(
        r#"{"stocks": [
            {"symbol": "AAPL", "name": "Apple Inc.", "upper_threshold": 200, "lower_threshold": 150},
            {"symbol": "MSFT", "upper_threshold": 500},
            {"symbol": "KO", "upper_threshold": 80, "lower_threshold": 55}
        ]}"#,
    );

    let report = runner(client()).with_pacing(Duration::ZERO).run(&watchlist).await;

    let quoted = report
        .quotes
        .iter()
        .map(|success| success.quote.symbol.as_str())
        .collect::<Vec<_>>();
    assert_eq!(quoted, vec!["AAPL", "KO"]);
    assert_eq!(report.quotes[1].quote.price, dec!(61.5));

    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.failures[0].symbol, "MSFT");
    assert_eq!(report.failures[0].reason, FailureReason::SourcesExhausted);

    assert_eq!(report.violation_count(), 1);
    let violation = &report.violations[0];
    assert_eq!(violation.kind, ThresholdKind::AboveUpper);
    assert_eq!(
        violation.message,
        "Apple Inc. (AAPL) reached $210.0000 (threshold: $200.0000)"
    );
}

#[tokio::test(start_paused = true)]
async fn sequential_batch_spaces_network_operations() {
    let watchlist = watchlist(
        r#"{"stocks": [
            {"symbol": "AAPL", "upper_threshold": 300},
            {"symbol": "KO", "upper_threshold": 80},
            {"symbol": "NVDA", "upper_threshold": 200}
        ]}"#,
    );
    let client = client();
    let started = Instant::now();

    let report = runner(client.clone())
        .with_pacing(Duration::from_secs(3))
        .run(&watchlist)
        .await;

    assert_eq!(report.quote_count(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert_eq!(client.recorded_requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn parallel_batch_still_paces_each_provider() {
    let watchlist = watchlist(
        r#"{"stocks": [
            {"symbol": "AAPL", "upper_threshold": 300},
            {"symbol": "KO", "upper_threshold": 80},
            {"symbol": "NVDA", "upper_threshold": 200}
        ]}"#,
    );
    let started = Instant::now();

    let report = runner(client())
        .with_concurrency(3)
        .with_pacing(Duration::from_secs(3))
        .run(&watchlist)
        .await;

    let quoted = report
        .quotes
        .iter()
        .map(|success| success.quote.symbol.as_str())
        .collect::<Vec<_>>();
    assert_eq!(quoted, vec!["AAPL", "KO", "NVDA"]);
    // One provider: the per-provider gap serialises the three requests.
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn cycle_deadline_abandons_remaining_symbols() {
    let watchlist = watchlist(
        r#"{"stocks": [
            {"symbol": "AAPL", "upper_threshold": 300},
            {"symbol": "KO", "upper_threshold": 80},
            {"symbol": "NVDA", "upper_threshold": 200}
        ]}"#,
    );
    let client = client();

    let report = runner(client.clone())
        .with_pacing(Duration::from_secs(3))
        .with_cycle_timeout(Duration::from_secs(4))
        .run(&watchlist)
        .await;

    assert_eq!(report.quote_count(), 2);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.failures[0].symbol, "NVDA");
    assert_eq!(report.failures[0].reason, FailureReason::TimedOut);
    assert_eq!(client.recorded_requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_entries_are_reported_without_fetching() {
    let watchlist = watchlist(
        r#"{"stocks": [
            {"symbol": "AAPL", "upper_threshold": 300},
            {"symbol": "KO", "upper_threshold": 50, "lower_threshold": 60},
            {"symbol": "NVDA", "upper_threshold": -1, "lower_threshold": null}
        ]}"#,
    );
    let client = client();

    let report = runner(client.clone())
        .with_pacing(Duration::ZERO)
        .run(&watchlist)
        .await;

    assert_eq!(report.quote_count(), 1);
    let reasons = report
        .failures
        .iter()
        .map(|failure| (failure.symbol.as_str(), failure.reason))
        .collect::<Vec<_>>();
    assert_eq!(
        reasons,
        vec![
            ("KO", FailureReason::InvalidConfig),
            ("NVDA", FailureReason::InvalidConfig),
        ]
    );
    let urls = client
        .recorded_requests()
        .into_iter()
        .map(|request| request.url)
        .collect::<Vec<_>>();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with(&format!("{CHART_URL}/AAPL?")));
}
