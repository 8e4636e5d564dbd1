//! Core contracts for tickwatch.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Locale-aware price parsing
//! - Price source trait, provider adapters and the fallback/retry router
//! - Pacing, retry and provider quota policies
//! - Threshold evaluation and the batch runner
//! - Watchlist and settings loading, alert rendering and notifiers

pub mod adapters;
pub mod alert;
pub mod batch;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod http_client;
pub mod pacing;
pub mod price_parser;
pub mod provider_policy;
pub mod retry;
pub mod routing;
pub mod source;
pub mod throttling;
pub mod watchlist;

pub use adapters::{BoursoramaAdapter, GoogleFinanceAdapter, MarketWatchAdapter, YahooChartAdapter};
pub use alert::{
    AlertReport, FileNotifier, LogNotifier, Notifier, NotifierRegistry, NullNotifier, ReportKind,
};
pub use batch::{BatchReport, BatchRunner};
pub use config::Settings;
pub use data_source::{ErrorClass, FetchError, FetchErrorKind, PriceReading, PriceSource};
pub use domain::{
    display_name, Listing, Quote, Symbol, SymbolShape, ThresholdKind, ThresholdSpec, UtcDateTime,
    Violation,
};
pub use error::{ConfigError, NotifyError, ValidationError};
pub use evaluator::evaluate;
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, ScriptedHttpClient,
};
pub use pacing::{Pacer, PacingScope};
pub use price_parser::{parse_price, parse_price_detailed, NumberFormat, ParseError, ParsedPrice};
pub use provider_policy::ProviderPolicy;
pub use retry::{Backoff, RetryPolicy};
pub use routing::{
    AttemptRecord, FailureReason, FetchFailure, FetchOutcome, FetchSuccess, SourceRouter,
    SourceRouterBuilder, SourceStrategy,
};
pub use source::ProviderId;
pub use throttling::ThrottlingQueue;
pub use watchlist::{RejectedEntry, WatchEntry, Watchlist};
