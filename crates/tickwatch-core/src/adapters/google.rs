use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::extract::{locate_html, Locator};
use super::{acquire_quota, currency_or, fetch_body, listing_currency, reading_from_text};
use crate::data_source::{FetchError, PriceReading, PriceSource};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::throttling::ThrottlingQueue;
use crate::{ProviderId, Symbol};

const BASE_URL: &str = "https://www.google.com/finance/quote";

const PRICE_LOCATORS: &[Locator] = &[
    Locator::Attribute("data-last-price"),
    Locator::Element("YMlKec fxKbKc"),
];

/// Google Finance quote pages, addressed as `TICKER:EXCHANGE`.
#[derive(Clone)]
pub struct GoogleFinanceAdapter {
    http_client: Arc<dyn HttpClient>,
    default_exchange: String,
    timeout_ms: u64,
    throttling: Option<ThrottlingQueue>,
}

impl GoogleFinanceAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            default_exchange: String::from("NASDAQ"),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            throttling: None,
        }
    }

    /// Exchange appended to bare tickers (`AAPL` becomes `AAPL:NASDAQ`).
    pub fn with_default_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.default_exchange = exchange.into().trim().to_ascii_uppercase();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_throttling(mut self, throttling: ThrottlingQueue) -> Self {
        self.throttling = Some(throttling);
        self
    }

    /// Provider query form for `symbol`.
    pub fn query_for(&self, symbol: &Symbol) -> String {
        let exchange = match (symbol.listing(), symbol.exchange_qualifier()) {
            (Some(listing), _) => listing.exchange,
            (None, Some(qualifier)) => qualifier,
            (None, None) => self.default_exchange.as_str(),
        };
        format!("{}:{exchange}", symbol.base_ticker())
    }

    async fn fetch(&self, symbol: &Symbol) -> Result<PriceReading, FetchError> {
        acquire_quota(self.throttling.as_ref(), ProviderId::Google)?;

        let url = format!("{BASE_URL}/{}?hl=en", self.query_for(symbol));
        let request = HttpRequest::browser(url).with_timeout_ms(self.timeout_ms);
        let body = fetch_body(self.http_client.as_ref(), ProviderId::Google, request).await?;

        let raw = locate_html(&body, PRICE_LOCATORS)?.ok_or_else(|| {
            FetchError::price_not_found(format!("no price element on google page for {symbol}"))
        })?;

        let page_currency = locate_html(&body, &[Locator::Attribute("data-currency-code")])?;
        let fallback = currency_or(page_currency, listing_currency(symbol));
        reading_from_text(raw, &fallback)
    }
}

impl PriceSource for GoogleFinanceAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Google
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
