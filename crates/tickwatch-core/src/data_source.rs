use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::http_client::HttpError;
use crate::price_parser::ParseError;
use crate::{ProviderId, Symbol};

/// Whether repeating the same request may change its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Connect,
    RateLimited,
    /// 408 or 5xx from the provider.
    Upstream,
    /// Any other non-success status.
    Rejected,
    NotFound,
    UnsupportedSymbol,
    /// Page retrieved, but no locator produced price text.
    PriceNotFound,
    Parse,
    Internal,
}

impl FetchErrorKind {
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::Timeout | Self::Connect | Self::RateLimited | Self::Upstream => {
                ErrorClass::Transient
            }
            Self::Rejected
            | Self::NotFound
            | Self::UnsupportedSymbol
            | Self::PriceNotFound
            | Self::Parse
            | Self::Internal => ErrorClass::Permanent,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::RateLimited => "rate_limited",
            Self::Upstream => "upstream",
            Self::Rejected => "rejected",
            Self::NotFound => "not_found",
            Self::UnsupportedSymbol => "unsupported_symbol",
            Self::PriceNotFound => "price_not_found",
            Self::Parse => "parse",
            Self::Internal => "internal",
        }
    }
}

/// Structured adapter error consumed by the fetcher's retry and fallback
/// decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchError {
    kind: FetchErrorKind,
    provider: Option<ProviderId>,
    message: String,
    #[serde(skip)]
    parse: Option<ParseError>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: None,
            message: message.into(),
            parse: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Connect, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::RateLimited, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Upstream, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound, message)
    }

    pub fn unsupported_symbol(symbol: &Symbol) -> Self {
        Self::new(
            FetchErrorKind::UnsupportedSymbol,
            format!("symbol '{symbol}' has no mapping for this source"),
        )
    }

    pub fn price_not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::PriceNotFound, message)
    }

    pub fn parse(error: ParseError) -> Self {
        Self {
            parse: Some(error.clone()),
            ..Self::new(FetchErrorKind::Parse, error.to_string())
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Internal, message)
    }

    /// Map a transport failure. Transport errors without a timeout or
    /// connect flag are treated as connection-level and stay retryable.
    pub fn from_transport(error: &HttpError) -> Self {
        if error.is_timeout() {
            Self::timeout(error.message())
        } else {
            Self::connect(error.message())
        }
    }

    /// Map a non-success HTTP status. 403 is grouped with 429 because the
    /// scraped providers answer bursts of requests with it.
    pub fn from_status(status: u16) -> Self {
        let message = format!("provider returned status {status}");
        let kind = match status {
            429 | 403 => FetchErrorKind::RateLimited,
            408 | 500..=599 => FetchErrorKind::Upstream,
            404 | 410 => FetchErrorKind::NotFound,
            _ => FetchErrorKind::Rejected,
        };
        Self::new(kind, message)
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider = Some(provider);
        self
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub const fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    pub const fn retryable(&self) -> bool {
        matches!(self.kind.class(), ErrorClass::Transient)
    }

    pub const fn provider(&self) -> Option<ProviderId> {
        self.provider
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse.as_ref()
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Timeout => "fetch.timeout",
            FetchErrorKind::Connect => "fetch.connect",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::Upstream => "fetch.upstream",
            FetchErrorKind::Rejected => "fetch.rejected",
            FetchErrorKind::NotFound => "fetch.not_found",
            FetchErrorKind::UnsupportedSymbol => "fetch.unsupported_symbol",
            FetchErrorKind::PriceNotFound => "fetch.price_not_found",
            FetchErrorKind::Parse => "fetch.parse",
            FetchErrorKind::Internal => "fetch.internal",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.provider {
            Some(provider) => write!(f, "{provider}: {} ({})", self.message, self.code()),
            None => write!(f, "{} ({})", self.message, self.code()),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.parse
            .as_ref()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

impl From<ParseError> for FetchError {
    fn from(error: ParseError) -> Self {
        Self::parse(error)
    }
}

/// Price text located on a provider page and its parsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceReading {
    pub raw: String,
    pub price: Decimal,
    pub currency: String,
}

/// Provider adapter contract: one attempt, no internal retry.
pub trait PriceSource: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Whether this provider can address `symbol` at all. Unsupported symbols
    /// are skipped without any network call.
    fn supports(&self, symbol: &Symbol) -> bool;

    fn fetch_price<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<PriceReading, FetchError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_separates_transient_from_permanent() {
        assert_eq!(FetchError::from_status(429).kind(), FetchErrorKind::RateLimited);
        assert_eq!(FetchError::from_status(403).kind(), FetchErrorKind::RateLimited);
        assert_eq!(FetchError::from_status(503).kind(), FetchErrorKind::Upstream);
        assert_eq!(FetchError::from_status(408).kind(), FetchErrorKind::Upstream);
        assert_eq!(FetchError::from_status(404).kind(), FetchErrorKind::NotFound);
        assert_eq!(FetchError::from_status(400).kind(), FetchErrorKind::Rejected);

        assert!(FetchError::from_status(502).retryable());
        assert!(!FetchError::from_status(404).retryable());
        assert!(!FetchError::from_status(401).retryable());
    }

    #[test]
    fn transport_errors_are_transient() {
        let timeout = FetchError::from_transport(&HttpError::timeout("deadline"));
        let reset = FetchError::from_transport(&HttpError::new("connection reset"));

        assert_eq!(timeout.kind(), FetchErrorKind::Timeout);
        assert_eq!(reset.class(), ErrorClass::Transient);
    }

    #[test]
    fn parse_errors_are_permanent_and_keep_their_cause() {
        let cause = ParseError::NoDigits {
            input: String::from("n/a"),
        };
        let error = FetchError::from(cause.clone()).with_provider(ProviderId::Google);

        assert_eq!(error.class(), ErrorClass::Permanent);
        assert_eq!(error.parse_error(), Some(&cause));
        assert_eq!(error.provider(), Some(ProviderId::Google));
        assert!(error.to_string().starts_with("google: "));
    }
}
