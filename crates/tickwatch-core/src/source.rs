use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in quotes, errors and routing tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Google,
    Marketwatch,
    Boursorama,
    Yahoo,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [Self::Google, Self::Marketwatch, Self::Boursorama, Self::Yahoo];

    /// Default fallback order for symbols without a regional hint.
    pub const DEFAULT_ORDER: [Self; 4] =
        [Self::Google, Self::Marketwatch, Self::Yahoo, Self::Boursorama];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Marketwatch => "marketwatch",
            Self::Boursorama => "boursorama",
            Self::Yahoo => "yahoo",
        }
    }

    /// Country whose instruments this provider resolves best, if any.
    pub const fn home_region(self) -> Option<&'static str> {
        match self {
            Self::Boursorama => Some("FR"),
            Self::Google | Self::Marketwatch | Self::Yahoo => None,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" | "googlefinance" => Ok(Self::Google),
            "marketwatch" => Ok(Self::Marketwatch),
            "boursorama" => Ok(Self::Boursorama),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
