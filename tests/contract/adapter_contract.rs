use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tickwatch_core::http_client::BROWSER_USER_AGENT;
use tickwatch_core::{
    BoursoramaAdapter, ErrorClass, FetchErrorKind, GoogleFinanceAdapter, HttpClient,
    HttpResponse, MarketWatchAdapter, PriceSource, ProviderId, ScriptedHttpClient,
    YahooChartAdapter,
};
use tickwatch_tests::symbol;

struct AdapterCase {
    id: ProviderId,
    symbol: &'static str,
    url_prefix: &'static str,
    page: &'static str,
    expected: Decimal,
    supports_isin: bool,
    build: fn(Arc<dyn HttpClient>) -> Arc<dyn PriceSource>,
}

fn adapter_cases() -> Vec<AdapterCase> {
    vec![
        AdapterCase {
            id: ProviderId::Google,
            symbol: "AAPL",
            url_prefix: "https://www.google.com/finance/quote/AAPL:NASDAQ",
            page: r#"<div class="YMlKec fxKbKc">$259.60</div>"#,
            expected: dec!(259.60),
            supports_isin: false,
            build: |client| Arc::new(GoogleFinanceAdapter::new(client).with_timeout_ms(2_500)),
        },
        AdapterCase {
            id: ProviderId::Marketwatch,
            symbol: "AAPL",
            url_prefix: "https://www.marketwatch.com/investing/stock/aapl",
            page: r#"<meta name="price" content="$1,259.60">"#,
            expected: dec!(1259.60),
            supports_isin: false,
            build: |client| Arc::new(MarketWatchAdapter::new(client).with_timeout_ms(2_500)),
        },
        AdapterCase {
            id: ProviderId::Boursorama,
            symbol: "MC.PA",
            url_prefix: "https://www.boursorama.com/cours/1rPMC/",
            page: r#"<span class="c-instrument c-instrument--last">1&nbsp;234,56</span>"#,
            expected: dec!(1234.56),
            supports_isin: true,
            build: |client| Arc::new(BoursoramaAdapter::new(client).with_timeout_ms(2_500)),
        },
        AdapterCase {
            id: ProviderId::Yahoo,
            symbol: "AAPL",
            url_prefix: "https://query1.finance.yahoo.com/v8/finance/chart/AAPL",
            page: r#"{"chart":{"result":[{"meta":{"currency":"USD","regularMarketPrice":259.6}}]}}"#,
            expected: dec!(259.6),
            supports_isin: false,
            build: |client| Arc::new(YahooChartAdapter::new(client).with_timeout_ms(2_500)),
        },
    ]
}

#[tokio::test]
async fn every_adapter_sends_one_browser_like_request_and_parses_the_price() {
    for case in adapter_cases() {
        let client = Arc::new(ScriptedHttpClient::new().respond(case.url_prefix, Ok(HttpResponse::ok(case.page))));
        let adapter = (case.build)(client.clone());

        assert_eq!(adapter.id(), case.id);
        let reading = adapter
            .fetch_price(&symbol(case.symbol))
            .await
            .unwrap_or_else(|error| panic!("{} failed: {error}", case.id));
        assert_eq!(reading.price, case.expected, "{}: price", case.id);

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1, "{}: request count", case.id);
        let request = &requests[0];
        assert_eq!(
            request.headers.get("user-agent").map(String::as_str),
            Some(BROWSER_USER_AGENT),
            "{}: user agent",
            case.id
        );
        assert!(request.headers.contains_key("accept-language"), "{}", case.id);
        assert_eq!(request.timeout_ms, 2_500, "{}: timeout", case.id);
    }
}

#[tokio::test]
async fn server_errors_are_transient_and_never_retried_inside_the_adapter() {
    for case in adapter_cases() {
        let client = Arc::new(
            ScriptedHttpClient::new()
                .respond(case.url_prefix, Ok(HttpResponse::with_status(503, "busy"))),
        );
        let adapter = (case.build)(client.clone());

        let error = adapter
            .fetch_price(&symbol(case.symbol))
            .await
            .expect_err("503 must fail");

        assert_eq!(error.kind(), FetchErrorKind::Upstream, "{}", case.id);
        assert_eq!(error.class(), ErrorClass::Transient, "{}", case.id);
        assert_eq!(client.recorded_requests().len(), 1, "{}: no retry", case.id);
    }
}

#[tokio::test]
async fn pages_without_price_are_permanent_failures() {
    for case in adapter_cases() {
        let body = if case.id == ProviderId::Yahoo {
            r#"{"chart":{"result":[{"meta":{}}]}}"#
        } else {
            "<html><body>Consent required</body></html>"
        };
        let client = Arc::new(ScriptedHttpClient::new().respond(case.url_prefix, Ok(HttpResponse::ok(body))));
        let adapter = (case.build)(client);

        let error = adapter
            .fetch_price(&symbol(case.symbol))
            .await
            .expect_err("no price on page");

        assert_eq!(error.kind(), FetchErrorKind::PriceNotFound, "{}", case.id);
        assert!(!error.retryable(), "{}", case.id);
    }
}

#[tokio::test]
async fn unparsable_price_text_is_a_parse_error() {
    let client = Arc::new(ScriptedHttpClient::new().respond(
        "https://www.google.com/finance/quote/",
        Ok(HttpResponse::ok(r#"<div class="YMlKec fxKbKc">N/A</div>"#)),
    ));
    let adapter = GoogleFinanceAdapter::new(client);

    let error = adapter
        .fetch_price(&symbol("AAPL"))
        .await
        .expect_err("no digits");

    assert_eq!(error.kind(), FetchErrorKind::Parse);
    assert!(error.parse_error().is_some());
}

#[tokio::test]
async fn only_the_search_capable_adapter_accepts_isins() {
    let isin = symbol("FR0000121014");

    for case in adapter_cases() {
        let client = Arc::new(ScriptedHttpClient::new());
        let adapter = (case.build)(client.clone());

        assert_eq!(adapter.supports(&isin), case.supports_isin, "{}", case.id);
        if !case.supports_isin {
            let error = adapter.fetch_price(&isin).await.expect_err("unsupported");
            assert_eq!(error.kind(), FetchErrorKind::UnsupportedSymbol, "{}", case.id);
            assert!(client.recorded_requests().is_empty(), "{}", case.id);
        }
    }
}
