//! Provider adapters. Each one maps a [`Symbol`] to a provider URL, issues
//! one GET (two for Boursorama ISIN lookups), locates the price text and
//! hands it to the price parser. None of them retry.

mod boursorama;
mod extract;
mod google;
mod marketwatch;
mod yahoo;

pub use boursorama::BoursoramaAdapter;
pub use extract::{clean_text, decode_entities, locate_html, locate_json, Locator};
pub use google::GoogleFinanceAdapter;
pub use marketwatch::MarketWatchAdapter;
pub use yahoo::YahooChartAdapter;

use crate::data_source::{FetchError, PriceReading};
use crate::http_client::{HttpClient, HttpRequest};
use crate::price_parser::parse_price_detailed;
use crate::throttling::ThrottlingQueue;
use crate::{ProviderId, Symbol};

/// GET `request` and return the body of a 2xx response.
async fn fetch_body(
    http_client: &dyn HttpClient,
    provider: ProviderId,
    request: HttpRequest,
) -> Result<String, FetchError> {
    tracing::debug!(provider = %provider, url = %request.url, "requesting quote page");

    let response = http_client
        .execute(request)
        .await
        .map_err(|error| FetchError::from_transport(&error))?;

    if !response.is_success() {
        return Err(FetchError::from_status(response.status));
    }

    Ok(response.body)
}

/// Take one unit of the provider's quota, failing fast when it is spent.
fn acquire_quota(throttling: Option<&ThrottlingQueue>, provider: ProviderId) -> Result<(), FetchError> {
    let Some(queue) = throttling else {
        return Ok(());
    };

    queue.acquire().map_err(|wait| {
        FetchError::rate_limited(format!(
            "{provider} request quota exhausted; next slot in {:.1}s",
            wait.as_secs_f64()
        ))
    })
}

/// Parse located price text. `fallback_currency` applies when the text
/// carries no currency marker of its own.
fn reading_from_text(raw: String, fallback_currency: &str) -> Result<PriceReading, FetchError> {
    let parsed = parse_price_detailed(&raw)?;
    let currency = parsed.currency.unwrap_or(fallback_currency).to_owned();

    Ok(PriceReading {
        raw,
        price: parsed.value,
        currency,
    })
}

/// Trading currency implied by a symbol's listing; USD for bare tickers.
fn listing_currency(symbol: &Symbol) -> &'static str {
    let country = symbol.listing().map(|listing| listing.country);
    match country {
        Some("FR" | "DE" | "NL" | "IT" | "ES" | "BE") => "EUR",
        Some("GB") => "GBP",
        Some("CH") => "CHF",
        Some("CA") => "CAD",
        Some("JP") => "JPY",
        Some("HK") => "HKD",
        _ => "USD",
    }
}

/// Keep a provider-reported currency only when it is a plausible ISO code.
fn currency_or(candidate: Option<String>, fallback: &str) -> String {
    candidate
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| code.len() == 3 && code.chars().all(|ch| ch.is_ascii_uppercase()))
        .unwrap_or_else(|| fallback.to_owned())
}
