use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 24;
const ISIN_LEN: usize = 12;

/// A non-US listing recognised from a ticker suffix (`MC.PA`) or an exchange
/// qualifier (`MC:EPA`, `EPA:MC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listing {
    /// ISO 3166 alpha-2 country of the venue.
    pub country: &'static str,
    /// Suffix used by dotted tickers (`PA` in `MC.PA`).
    pub suffix: &'static str,
    /// Exchange code used by colon-qualified tickers (`EPA` in `MC:EPA`).
    pub exchange: &'static str,
}

const LISTINGS: &[Listing] = &[
    Listing { country: "FR", suffix: "PA", exchange: "EPA" },
    Listing { country: "DE", suffix: "DE", exchange: "ETR" },
    Listing { country: "GB", suffix: "L", exchange: "LON" },
    Listing { country: "NL", suffix: "AS", exchange: "AMS" },
    Listing { country: "IT", suffix: "MI", exchange: "BIT" },
    Listing { country: "ES", suffix: "MC", exchange: "BME" },
    Listing { country: "CH", suffix: "SW", exchange: "SWX" },
    Listing { country: "BE", suffix: "BR", exchange: "EBR" },
    Listing { country: "CA", suffix: "TO", exchange: "TSE" },
    Listing { country: "JP", suffix: "T", exchange: "TYO" },
    Listing { country: "HK", suffix: "HK", exchange: "HKG" },
];

/// Recognised symbol formats. Shape drives adapter ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolShape {
    /// Exchange ticker, optionally suffixed (`AAPL`, `MC.PA`, `AAPL:NASDAQ`).
    Ticker,
    /// 2-letter country prefix followed by 10 alphanumerics (`FR0000121014`).
    Isin,
}

/// Normalized instrument identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize a symbol to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        if let Some(first) = normalized.chars().next() {
            if !first.is_ascii_alphanumeric() {
                return Err(ValidationError::SymbolInvalidStart { ch: first });
            }
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | ':');
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn shape(&self) -> SymbolShape {
        let bytes = self.0.as_bytes();
        let is_isin = bytes.len() == ISIN_LEN
            && bytes[..2].iter().all(u8::is_ascii_alphabetic)
            && bytes[2..].iter().all(u8::is_ascii_alphanumeric);

        if is_isin {
            SymbolShape::Isin
        } else {
            SymbolShape::Ticker
        }
    }

    pub fn is_isin(&self) -> bool {
        self.shape() == SymbolShape::Isin
    }

    /// Ticker without exchange suffix or qualifier (`MC` for `MC.PA`).
    pub fn base_ticker(&self) -> &str {
        if let Some((left, right)) = self.0.split_once(':') {
            return if listing_for_exchange(left).is_some() || is_us_exchange(left) {
                right
            } else {
                left
            };
        }

        match self.0.rsplit_once('.') {
            Some((base, suffix)) if listing_for_suffix(suffix).is_some() => base,
            _ => &self.0,
        }
    }

    /// Explicit exchange code from a colon-qualified symbol (`NASDAQ` for
    /// `AAPL:NASDAQ` or `NASDAQ:AAPL`).
    pub fn exchange_qualifier(&self) -> Option<&str> {
        let (left, right) = self.0.split_once(':')?;
        if listing_for_exchange(left).is_some() || is_us_exchange(left) {
            Some(left)
        } else {
            Some(right)
        }
    }

    /// Non-US listing implied by a suffix or exchange qualifier.
    pub fn listing(&self) -> Option<&'static Listing> {
        if let Some(exchange) = self.exchange_qualifier() {
            return listing_for_exchange(exchange);
        }
        let (_, suffix) = self.0.rsplit_once('.')?;
        listing_for_suffix(suffix)
    }

    /// Country hint used to promote a regional provider: the ISIN prefix for
    /// ISIN-shaped symbols, the listing country for suffixed tickers.
    pub fn region_hint(&self) -> Option<&str> {
        match self.shape() {
            SymbolShape::Isin => Some(&self.0[..2]),
            SymbolShape::Ticker => self.listing().map(|listing| listing.country),
        }
    }
}

fn listing_for_suffix(suffix: &str) -> Option<&'static Listing> {
    LISTINGS.iter().find(|listing| listing.suffix == suffix)
}

fn listing_for_exchange(exchange: &str) -> Option<&'static Listing> {
    LISTINGS.iter().find(|listing| listing.exchange == exchange)
}

fn is_us_exchange(exchange: &str) -> bool {
    matches!(exchange, "NASDAQ" | "NYSE" | "NYSEARCA" | "NYSEAMERICAN" | "BATS")
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
