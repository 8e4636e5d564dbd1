use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::extract::{locate_html, Locator};
use super::{acquire_quota, currency_or, fetch_body, listing_currency, reading_from_text};
use crate::data_source::{FetchError, PriceReading, PriceSource};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::throttling::ThrottlingQueue;
use crate::{ProviderId, Symbol};

const BASE_URL: &str = "https://www.marketwatch.com/investing/stock";

const PRICE_LOCATORS: &[Locator] = &[
    Locator::Meta("price"),
    Locator::Element("intraday__price"),
    Locator::Element(r#"class="value""#),
];

/// MarketWatch stock pages, keyed by lowercase ticker plus a country code
/// for non-US listings.
#[derive(Clone)]
pub struct MarketWatchAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
    throttling: Option<ThrottlingQueue>,
}

impl MarketWatchAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            throttling: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_throttling(mut self, throttling: ThrottlingQueue) -> Self {
        self.throttling = Some(throttling);
        self
    }

    pub fn url_for(&self, symbol: &Symbol) -> String {
        let ticker = symbol.base_ticker().to_ascii_lowercase();
        match symbol.listing() {
            Some(listing) => format!(
                "{BASE_URL}/{ticker}?countrycode={}",
                listing.country.to_ascii_lowercase()
            ),
            None => format!("{BASE_URL}/{ticker}"),
        }
    }

    async fn fetch(&self, symbol: &Symbol) -> Result<PriceReading, FetchError> {
        acquire_quota(self.throttling.as_ref(), ProviderId::Marketwatch)?;

        let request = HttpRequest::browser(self.url_for(symbol)).with_timeout_ms(self.timeout_ms);
        let body = fetch_body(self.http_client.as_ref(), ProviderId::Marketwatch, request).await?;

        let raw = locate_html(&body, PRICE_LOCATORS)?.ok_or_else(|| {
            FetchError::price_not_found(format!("no price element on marketwatch page for {symbol}"))
        })?;

        let page_currency = locate_html(&body, &[Locator::Meta("priceCurrency")])?;
        let fallback = currency_or(page_currency, listing_currency(symbol));
        reading_from_text(raw, &fallback)
    }
}

impl PriceSource for MarketWatchAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Marketwatch
    }

    fn supports(&self, symbol: &Symbol) -> bool {
        !symbol.is_isin()
    }

    fn fetch_price<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<PriceReading, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.supports(symbol) {
                return Err(FetchError::unsupported_symbol(symbol));
            }
            self.fetch(symbol).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::FetchErrorKind;
    use crate::http_client::{HttpError, HttpResponse, ScriptedHttpClient};
    use rust_decimal_macros::dec;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[test]
    fn url_carries_country_code_for_foreign_listings() {
        let adapter = MarketWatchAdapter::new(Arc::new(ScriptedHttpClient::new()));

        assert_eq!(
            adapter.url_for(&symbol("MSFT")),
            "https://www.marketwatch.com/investing/stock/msft"
        );
        assert_eq!(
            adapter.url_for(&symbol("MC.PA")),
            "https://www.marketwatch.com/investing/stock/mc?countrycode=fr"
        );
    }

    #[tokio::test]
    async fn falls_through_locators_to_bg_quote() {
        let client = Arc::new(ScriptedHttpClient::new().respond(
            "https://www.marketwatch.com/investing/stock/msft",
            Ok(HttpResponse::ok(
                r#"<h3 class="intraday__status">Closed</h3><bg-quote class="value" field="Last">1,234.56</bg-quote>"#,
            )),
        ));
        let adapter = MarketWatchAdapter::new(client);

        let reading = adapter
            .fetch_price(&symbol("MSFT"))
            .await
            .expect("price should be found");

        assert_eq!(reading.price, dec!(1234.56));
        assert_eq!(reading.currency, "USD");
    }

    #[tokio::test]
    async fn meta_currency_is_used_when_text_has_none() {
        let client = Arc::new(ScriptedHttpClient::new().respond(
            "https://www.marketwatch.com/investing/stock/mc",
            Ok(HttpResponse::ok(
                r#"<meta name="price" content="612.40"><meta name="priceCurrency" content="EUR">"#,
            )),
        ));
        let adapter = MarketWatchAdapter::new(client);

        let reading = adapter
            .fetch_price(&symbol("MC.PA"))
            .await
            .expect("price should be found");

        assert_eq!(reading.price, dec!(612.40));
        assert_eq!(reading.currency, "EUR");
    }

    #[tokio::test]
    async fn timeouts_and_throttling_are_transient() {
        let client = Arc::new(
            ScriptedHttpClient::new()
                .respond(
                    "https://www.marketwatch.com/investing/stock/msft",
                    Err(HttpError::timeout("deadline elapsed")),
                )
                .respond(
                    "https://www.marketwatch.com/investing/stock/msft",
                    Ok(HttpResponse::with_status(403, "")),
                ),
        );
        let adapter = MarketWatchAdapter::new(client);

        let first = adapter.fetch_price(&symbol("MSFT")).await.expect_err("timeout");
        let second = adapter.fetch_price(&symbol("MSFT")).await.expect_err("forbidden");

        assert_eq!(first.kind(), FetchErrorKind::Timeout);
        assert_eq!(second.kind(), FetchErrorKind::RateLimited);
        assert!(first.retryable() && second.retryable());
    }

    #[tokio::test]
    async fn exhausted_quota_fails_before_any_request() {
        let client = Arc::new(ScriptedHttpClient::new());
        let adapter = MarketWatchAdapter::new(client.clone())
            .with_throttling(ThrottlingQueue::new(std::time::Duration::from_secs(60), 1));

        let _ = adapter.fetch_price(&symbol("MSFT")).await;
        let error = adapter
            .fetch_price(&symbol("MSFT"))
            .await
            .expect_err("quota exhausted");

        assert_eq!(error.kind(), FetchErrorKind::RateLimited);
        assert_eq!(client.recorded_requests().len(), 1);
    }
}
