use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::extract::{locate_json, Locator};
use super::{acquire_quota, currency_or, fetch_body, listing_currency, reading_from_text};
use crate::data_source::{FetchError, PriceReading, PriceSource};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::throttling::ThrottlingQueue;
use crate::{ProviderId, Symbol};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

const PRICE_LOCATORS: &[Locator] = &[
    Locator::JsonPointer("/chart/result/0/meta/regularMarketPrice"),
    Locator::JsonPointer("/chart/result/0/meta/previousClose"),
    Locator::JsonPointer("/chart/result/0/meta/chartPreviousClose"),
];

const CURRENCY_LOCATOR: &[Locator] = &[Locator::JsonPointer("/chart/result/0/meta/currency")];

/// Yahoo Finance chart API. Returns JSON, so no markup scraping is involved.
#[derive(Clone)]
pub struct YahooChartAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
    throttling: Option<ThrottlingQueue>,
}

impl YahooChartAdapter {
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

    /// Yahoo ticker form: listing suffix kept (`MC.PA`), US qualifiers
    /// dropped (`AAPL:NASDAQ` becomes `AAPL`).
    pub fn ticker_for(symbol: &Symbol) -> String {
        match symbol.listing() {
            Some(listing) => format!("{}.{}", symbol.base_ticker(), listing.suffix),
            None => symbol.base_ticker().to_owned(),
        }
    }

    async fn fetch(&self, symbol: &Symbol) -> Result<PriceReading, FetchError> {
        acquire_quota(self.throttling.as_ref(), ProviderId::Yahoo)?;

        let url = format!(
            "{BASE_URL}/{}?interval=1d&range=1d",
            urlencoding::encode(&Self::ticker_for(symbol))
        );
        let request = HttpRequest::browser(url).with_timeout_ms(self.timeout_ms);
        let body = fetch_body(self.http_client.as_ref(), ProviderId::Yahoo, request).await?;

        let document: Value = serde_json::from_str(&body).map_err(|e| {
            FetchError::price_not_found(format!("yahoo chart response is not JSON: {e}"))
        })?;

        let raw = locate_json(&document, PRICE_LOCATORS).ok_or_else(|| {
            FetchError::price_not_found(format!("no price field in yahoo chart for {symbol}"))
        })?;

        let reported = locate_json(&document, CURRENCY_LOCATOR);
        let currency = currency_or(reported, listing_currency(symbol));
        reading_from_text(raw, &currency)
    }
}

impl PriceSource for YahooChartAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
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
