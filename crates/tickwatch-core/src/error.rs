use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

/// Validation errors for symbols and domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter or digit: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of google, marketwatch, boursorama, yahoo")]
    InvalidSource { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}

/// Configuration errors. Surfaced before any fetch and never repaired.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid symbol '{value}': {source}")]
    InvalidSymbol {
        value: String,
        #[source]
        source: ValidationError,
    },

    #[error("threshold for {symbol} has neither an upper nor a lower bound")]
    NoBounds { symbol: String },

    #[error("threshold for {symbol} has lower bound {lower} >= upper bound {upper}")]
    InvertedBounds {
        symbol: String,
        lower: Decimal,
        upper: Decimal,
    },

    #[error("threshold for {symbol} has a non-numeric {field} bound")]
    InvalidBound { symbol: String, field: &'static str },

    #[error("symbol {symbol} is listed more than once")]
    DuplicateSymbol { symbol: String },

    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("malformed config {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("invalid setting '{field}': {message}")]
    InvalidSetting { field: &'static str, message: String },
}

impl ConfigError {
    pub fn invalid_setting(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            message: message.into(),
        }
    }
}

/// Alert delivery errors. Kept apart from fetch failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to write alert to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notifier '{notifier}' rejected the alert: {message}")]
    Rejected {
        notifier: &'static str,
        message: String,
    },
}
