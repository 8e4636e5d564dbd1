use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Symbol};

/// Upper/lower price bounds for one symbol.
///
/// Construction enforces that at least one bound is present and that
/// `lower < upper` when both are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdSpec {
    symbol: Symbol,
    upper: Option<Decimal>,
    lower: Option<Decimal>,
}

impl ThresholdSpec {
    pub fn new(
        symbol: Symbol,
        upper: Option<Decimal>,
        lower: Option<Decimal>,
    ) -> Result<Self, ConfigError> {
        match (lower, upper) {
            (None, None) => {
                return Err(ConfigError::NoBounds {
                    symbol: symbol.to_string(),
                })
            }
            (Some(lower), Some(upper)) if lower >= upper => {
                return Err(ConfigError::InvertedBounds {
                    symbol: symbol.to_string(),
                    lower,
                    upper,
                })
            }
            _ => {}
        }

        Ok(Self {
            symbol,
            upper,
            lower,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn upper(&self) -> Option<Decimal> {
        self.upper
    }

    pub fn lower(&self) -> Option<Decimal> {
        self.lower
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdKind {
    AboveUpper,
    BelowLower,
}

impl ThresholdKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AboveUpper => "upper",
            Self::BelowLower => "lower",
        }
    }
}

impl Display for ThresholdKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quote whose price lies outside a configured bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub kind: ThresholdKind,
    pub threshold: Decimal,
    pub message: String,
}

impl Violation {
    /// `"Name (SYMBOL)"` when a name is configured, else the bare symbol.
    pub fn display_name(&self) -> String {
        display_name(&self.symbol, self.name.as_deref())
    }
}

pub fn display_name(symbol: &Symbol, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("{name} ({symbol})"),
        None => symbol.to_string(),
    }
}
