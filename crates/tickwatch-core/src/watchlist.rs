//! Watchlist file loading.
//!
//! ```json
//! {"stocks": [
//!   {"symbol": "AAPL", "name": "Apple Inc.", "upper_threshold": 200, "lower_threshold": 150},
//!   {"symbol": "FR0000121014", "name": "LVMH", "upper_threshold": 800, "lower_threshold": -1}
//! ]}
//! ```
//!
//! A bound that is `null`, absent, zero or negative is disabled. Entries are
//! validated one by one: a bad entry is set aside in
//! [`Watchlist::rejected`] and never fetched, the others are kept.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ConfigError, Symbol, ThresholdSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchEntry {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub spec: ThresholdSpec,
}

/// A watchlist entry that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntry {
    /// Symbol text as written in the file.
    pub symbol: String,
    pub name: Option<String>,
    #[serde(serialize_with = "serialize_display")]
    pub error: ConfigError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Watchlist {
    pub entries: Vec<WatchEntry>,
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Deserialize)]
struct WatchlistFile {
    #[serde(default)]
    stocks: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    upper_threshold: Option<Value>,
    #[serde(default)]
    lower_threshold: Option<Value>,
}

impl Watchlist {
    /// Load a watchlist file. A missing file is an empty watchlist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "watchlist file not found; nothing to track");
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    message: error.to_string(),
                })
            }
        };

        Self::from_json_str(&text).map_err(|error| match error {
            ConfigError::Malformed { message, .. } => ConfigError::Malformed {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let file: WatchlistFile =
            serde_json::from_str(text).map_err(|error| ConfigError::Malformed {
                path: Default::default(),
                message: error.to_string(),
            })?;

        let mut watchlist = Self::default();
        let mut seen = HashSet::new();

        for raw in file.stocks {
            let symbol_text = raw.symbol.clone().unwrap_or_default();
            let name = raw
                .name
                .clone()
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty());

            match validate_entry(raw) {
                Ok(entry) if !seen.insert(entry.symbol.clone()) => {
                    watchlist.reject(symbol_text, name, ConfigError::DuplicateSymbol {
                        symbol: entry.symbol.to_string(),
                    });
                }
                Ok(entry) => watchlist.entries.push(WatchEntry { name, ..entry }),
                Err(error) => watchlist.reject(symbol_text, name, error),
            }
        }

        Ok(watchlist)
    }

    fn reject(&mut self, symbol: String, name: Option<String>, error: ConfigError) {
        tracing::warn!(symbol = %symbol, error = %error, "watchlist entry rejected");
        self.rejected.push(RejectedEntry {
            symbol,
            name,
            error,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn symbols(&self) -> Vec<&Symbol> {
        self.entries.iter().map(|entry| &entry.symbol).collect()
    }
}

fn validate_entry(raw: RawEntry) -> Result<WatchEntry, ConfigError> {
    let text = raw.symbol.unwrap_or_default();
    let symbol = Symbol::parse(&text).map_err(|source| ConfigError::InvalidSymbol {
        value: text.clone(),
        source,
    })?;

    let upper = bound(&symbol, "upper", raw.upper_threshold)?;
    let lower = bound(&symbol, "lower", raw.lower_threshold)?;
    let spec = ThresholdSpec::new(symbol.clone(), upper, lower)?;

    Ok(WatchEntry {
        symbol,
        name: None,
        spec,
    })
}

/// Read one bound; non-positive values mean "disabled".
fn bound(
    symbol: &Symbol,
    field: &'static str,
    value: Option<Value>,
) -> Result<Option<Decimal>, ConfigError> {
    let invalid = || ConfigError::InvalidBound {
        symbol: symbol.to_string(),
        field,
    };

    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => decimal_from_text(&number.to_string()).ok_or_else(invalid)?,
        Some(Value::String(text)) => decimal_from_text(text.trim()).ok_or_else(invalid)?,
        Some(_) => return Err(invalid()),
    };

    Ok((number > Decimal::ZERO).then_some(number))
}

fn decimal_from_text(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn serialize_display<S: serde::Serializer>(
    error: &ConfigError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
