use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use super::extract::{locate_html, Locator};
use super::{acquire_quota, fetch_body, reading_from_text};
use crate::data_source::{FetchError, PriceReading, PriceSource};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::throttling::ThrottlingQueue;
use crate::{ProviderId, Symbol};

const BASE_URL: &str = "https://www.boursorama.com";
const DEFAULT_CURRENCY: &str = "EUR";

const PRICE_LOCATORS: &[Locator] = &[
    Locator::Element("c-instrument--last"),
    Locator::Element("data-ist-last"),
    Locator::Element("c-faceplate__price"),
];

/// Boursorama, the regional provider for Paris listings. Tickers map to the
/// `1rP{TICKER}` page directly; ISINs are resolved through the site search
/// first, so one attempt may issue two requests.
#[derive(Clone)]
pub struct BoursoramaAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
    throttling: Option<ThrottlingQueue>,
}

impl BoursoramaAdapter {
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

    fn request(&self, url: String) -> HttpRequest {
        HttpRequest::browser(url)
            .with_header("Referer", format!("{BASE_URL}/"))
            .with_timeout_ms(self.timeout_ms)
    }

    async fn get(&self, url: String) -> Result<String, FetchError> {
        acquire_quota(self.throttling.as_ref(), ProviderId::Boursorama)?;
        fetch_body(self.http_client.as_ref(), ProviderId::Boursorama, self.request(url)).await
    }

    /// Search by ISIN and return the instrument page body.
    async fn resolve_isin(&self, isin: &Symbol) -> Result<String, FetchError> {
        let search_url = format!(
            "{BASE_URL}/recherche/?query={}",
            urlencoding::encode(isin.as_str())
        );
        let search_page = self.get(search_url).await?;

        match instrument_id(&search_page) {
            Some(id) => {
                tracing::debug!(symbol = %isin, instrument = %id, "resolved isin on boursorama");
                self.get(format!("{BASE_URL}/cours/{id}/")).await
            }
            // An exact ISIN match redirects straight to the instrument page.
            None if locate_html(&search_page, PRICE_LOCATORS)?.is_some() => Ok(search_page),
            None => Err(FetchError::not_found(format!(
                "boursorama search returned no instrument for {isin}"
            ))),
        }
    }

    async fn fetch(&self, symbol: &Symbol) -> Result<PriceReading, FetchError> {
        let body = if symbol.is_isin() {
            self.resolve_isin(symbol).await?
        } else {
            self.get(format!("{BASE_URL}/cours/1rP{}/", symbol.base_ticker()))
                .await?
        };

        let raw = locate_html(&body, PRICE_LOCATORS)?.ok_or_else(|| {
            FetchError::price_not_found(format!("no price element on boursorama page for {symbol}"))
        })?;

        reading_from_text(raw, DEFAULT_CURRENCY)
    }
}

/// First `/cours/{id}/` link of a search result page.
fn instrument_id(search_page: &str) -> Option<String> {
    static COURS_LINK: OnceLock<Regex> = OnceLock::new();
    let link = COURS_LINK.get_or_init(|| {
        Regex::new(r#"href=["'](?:https?://www\.boursorama\.com)?/cours/([A-Za-z0-9.\-]+)/"#)
            .expect("static link pattern")
    });

    link.captures(search_page)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_owned())
}

impl PriceSource for BoursoramaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Boursorama
    }

    /// ISINs, Paris listings and bare tickers.
    fn supports(&self, symbol: &Symbol) -> bool {
        symbol.is_isin()
            || symbol
                .listing()
                .map_or(true, |listing| listing.country == "FR")
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
    use crate::http_client::{HttpResponse, ScriptedHttpClient};
    use rust_decimal_macros::dec;

    const INSTRUMENT_PAGE: &str = r#"
        <div class="c-faceplate__price">
          <span class="c-instrument c-instrument--last" data-ist-last>612,40</span>
          <span class="c-faceplate__price-currency">EUR</span>
        </div>"#;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[tokio::test]
    async fn isin_is_resolved_through_search_then_fetched() {
        let client = Arc::new(
            ScriptedHttpClient::new()
                .respond(
                    "https://www.boursorama.com/recherche/",
                    Ok(HttpResponse::ok(
                        r#"<a class="c-link" href="/cours/1rPMC/">LVMH</a><a href="/cours/1rPOTHER/">x</a>"#,
                    )),
                )
                .respond(
                    "https://www.boursorama.com/cours/1rPMC/",
                    Ok(HttpResponse::ok(INSTRUMENT_PAGE)),
                ),
        );
        let adapter = BoursoramaAdapter::new(client.clone());

        let reading = adapter
            .fetch_price(&symbol("FR0000121014"))
            .await
            .expect("isin should resolve");

        assert_eq!(reading.price, dec!(612.40));
        assert_eq!(reading.currency, "EUR");

        let urls = client
            .recorded_requests()
            .into_iter()
            .map(|request| request.url)
            .collect::<Vec<_>>();
        assert_eq!(
            urls,
            vec![
                String::from("https://www.boursorama.com/recherche/?query=FR0000121014"),
                String::from("https://www.boursorama.com/cours/1rPMC/"),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_isin_is_not_found() {
        let client = Arc::new(ScriptedHttpClient::new().respond(
            "https://www.boursorama.com/recherche/",
            Ok(HttpResponse::ok("<p>Aucun résultat</p>")),
        ));
        let adapter = BoursoramaAdapter::new(client);

        let error = adapter
            .fetch_price(&symbol("FR0000000000"))
            .await
            .expect_err("nothing to resolve");

        assert_eq!(error.kind(), FetchErrorKind::NotFound);
    }

    #[tokio::test]
    async fn ticker_maps_to_paris_page() {
        let client = Arc::new(ScriptedHttpClient::new().respond(
            "https://www.boursorama.com/cours/1rPMC/",
            Ok(HttpResponse::ok(INSTRUMENT_PAGE)),
        ));
        let adapter = BoursoramaAdapter::new(client);

        let reading = adapter
            .fetch_price(&symbol("MC.PA"))
            .await
            .expect("ticker page should parse");

        assert_eq!(reading.price, dec!(612.40));
    }

    #[test]
    fn foreign_listings_are_unsupported() {
        let adapter = BoursoramaAdapter::new(Arc::new(ScriptedHttpClient::new()));

        assert!(adapter.supports(&symbol("FR0000121014")));
        assert!(adapter.supports(&symbol("MC.PA")));
        assert!(!adapter.supports(&symbol("SAP.DE")));
    }
}
