use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ProviderId, Symbol, UtcDateTime, ValidationError};

/// A successfully parsed, timestamped price for a symbol from one source.
///
/// Quotes are immutable once built and are never cached across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: Decimal,
    /// Nominal currency reported by the source; no conversion is applied.
    pub currency: String,
    pub source: ProviderId,
    pub fetched_at: UtcDateTime,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        price: Decimal,
        currency: impl AsRef<str>,
        source: ProviderId,
        fetched_at: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(ValidationError::NegativeValue { field: "price" });
        }

        Ok(Self {
            symbol,
            price,
            currency: validate_currency_code(currency.as_ref())?,
            source,
            fetched_at,
        })
    }
}

pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    let valid = trimmed.len() == 3 && trimmed.chars().all(|ch| ch.is_ascii_uppercase());
    if !valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("valid symbol")
    }

    #[test]
    fn quote_rejects_negative_price() {
        let err = Quote::new(symbol(), dec!(-1), "USD", ProviderId::Google, UtcDateTime::now())
            .expect_err("negative price must fail");
        assert_eq!(err, ValidationError::NegativeValue { field: "price" });
    }

    #[test]
    fn quote_rejects_lowercase_currency() {
        let err = Quote::new(symbol(), dec!(10), "usd", ProviderId::Google, UtcDateTime::now())
            .expect_err("currency must be uppercase");
        assert!(matches!(err, ValidationError::InvalidCurrency { .. }));
    }

    #[test]
    fn quote_accepts_zero_price() {
        let quote = Quote::new(symbol(), dec!(0), "USD", ProviderId::Yahoo, UtcDateTime::now())
            .expect("zero is non-negative");
        assert!(quote.price.is_zero());
    }
}
