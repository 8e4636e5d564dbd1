//! Locale-aware price text normalization.
//!
//! Provider pages format the same price as `$259.60`, `259,60 €`,
//! `1,234.56` or `1.234,56`. [`parse_price`] strips currency markers, picks
//! the first numeric token, decides which separator is the decimal point and
//! returns a non-negative [`Decimal`].
//!
//! Separator rules, in order:
//!
//! | Token | Reading |
//! |-------|---------|
//! | both `,` and `.` | the last one is the decimal point |
//! | several `,` | US thousands groups |
//! | several `.` | European thousands groups |
//! | one `,` + exactly 3 digits, integer part 1-3 digits and not `0` | US thousands (`1,234` = 1234) |
//! | one `,` otherwise | decimal comma (`259,60`, `0,123`, `1234,567`) |
//! | one `.` | decimal point (`1.234` = 1.234) |
//! | leading `.` or `,` | decimal point after an implied `0` (`.5`, `,50 €`) |
//!
//! Spaces (including NBSP and narrow NBSP) and apostrophes are only accepted
//! as thousands separators when followed by exactly three digits.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Currency markers, longest first so `US$` wins over `$`.
const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("USD", "USD"),
    ("EUR", "EUR"),
    ("GBP", "GBP"),
    ("GBX", "GBX"),
    ("CHF", "CHF"),
    ("JPY", "JPY"),
    ("CAD", "CAD"),
    ("HKD", "HKD"),
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no digits found in '{input}'")]
    NoDigits { input: String },
    #[error("malformed number '{token}' in '{input}'")]
    Malformed { input: String, token: String },
    #[error("negative price in '{input}'")]
    Negative { input: String },
}

/// Separator convention detected for a numeric token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// No decimal or grouping separator.
    Plain,
    /// `,` groups thousands, `.` is the decimal point.
    Us,
    /// `.` groups thousands, `,` is the decimal point.
    European,
}

impl Display for NumberFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Us => "us",
            Self::European => "european",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedPrice {
    pub value: Decimal,
    pub format: NumberFormat,
    pub currency: Option<&'static str>,
}

/// Parse raw price text into a non-negative decimal.
pub fn parse_price(raw: &str) -> Result<Decimal, ParseError> {
    parse_price_detailed(raw).map(|parsed| parsed.value)
}

/// Like [`parse_price`], also reporting the detected format and currency.
pub fn parse_price_detailed(raw: &str) -> Result<ParsedPrice, ParseError> {
    let currency = detect_currency(raw);
    let stripped = strip_currency(raw);
    let chars = stripped.chars().collect::<Vec<_>>();

    let Some(start) = chars.iter().position(char::is_ascii_digit) else {
        return Err(ParseError::NoDigits {
            input: raw.to_owned(),
        });
    };

    // `.5` and `,50`: a separator right before the first digit is a decimal
    // point with an implied leading zero.
    let leading_point = start
        .checked_sub(1)
        .map(|index| chars[index])
        .filter(|ch| matches!(ch, '.' | ','));
    let prefix_end = start - usize::from(leading_point.is_some());

    if is_negated(&chars[..prefix_end]) {
        return Err(ParseError::Negative {
            input: raw.to_owned(),
        });
    }

    let mut token = numeric_token(&chars[start..]);
    if let Some(point) = leading_point {
        token.insert(0, point);
        token.insert(0, '0');
    }
    let malformed = || ParseError::Malformed {
        input: raw.to_owned(),
        token: token.clone(),
    };

    let (canonical, format) = canonicalize(&token).ok_or_else(malformed)?;
    let value = Decimal::from_str(&canonical).map_err(|_| malformed())?;

    Ok(ParsedPrice {
        value: value.normalize(),
        format,
        currency,
    })
}

/// ISO code of the first currency marker found in `raw`.
pub fn detect_currency(raw: &str) -> Option<&'static str> {
    CURRENCY_MARKERS
        .iter()
        .filter_map(|(marker, code)| raw.find(marker).map(|index| (index, *code)))
        .min_by_key(|(index, _)| *index)
        .map(|(_, code)| code)
}

fn strip_currency(raw: &str) -> String {
    CURRENCY_MARKERS
        .iter()
        .fold(raw.trim().to_owned(), |text, (marker, _)| text.replace(marker, " "))
}

fn is_negated(prefix: &[char]) -> bool {
    prefix
        .iter()
        .rev()
        .find(|ch| !ch.is_whitespace())
        .is_some_and(|ch| matches!(ch, '-' | '\u{2212}'))
}

fn is_group_space(ch: char) -> bool {
    matches!(ch, ' ' | '\'' | '\u{a0}' | '\u{202f}')
}

/// Longest run of digits and separators starting at a digit. Separators must
/// be followed by a digit; spaces only when followed by exactly 3 digits.
fn numeric_token(chars: &[char]) -> String {
    let mut token = String::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        if ch.is_ascii_digit() {
            token.push(ch);
            index += 1;
            continue;
        }

        let next_is_digit = chars.get(index + 1).is_some_and(char::is_ascii_digit);
        if matches!(ch, '.' | ',') && next_is_digit {
            token.push(ch);
            index += 1;
            continue;
        }

        if is_group_space(ch) && exactly_three_digits_follow(&chars[index + 1..]) {
            index += 1;
            continue;
        }

        break;
    }

    token
}

fn exactly_three_digits_follow(chars: &[char]) -> bool {
    let digits = chars.iter().take_while(|ch| ch.is_ascii_digit()).count();
    digits == 3
}

/// Rewrite a token to `digits[.digits]`.
fn canonicalize(token: &str) -> Option<(String, NumberFormat)> {
    let commas = token.matches(',').count();
    let dots = token.matches('.').count();

    match (commas, dots) {
        (0, 0) => Some((token.to_owned(), NumberFormat::Plain)),
        (0, 1) => Some((token.to_owned(), NumberFormat::Us)),
        (0, _) => grouped(token, '.', None).map(|value| (value, NumberFormat::European)),
        (1, 0) => {
            let (int_part, frac_part) = token.split_once(',')?;
            let thousands = frac_part.len() == 3 && int_part.len() <= 3 && int_part != "0";
            if thousands {
                Some((format!("{int_part}{frac_part}"), NumberFormat::Us))
            } else {
                Some((format!("{int_part}.{frac_part}"), NumberFormat::European))
            }
        }
        (_, 0) => grouped(token, ',', None).map(|value| (value, NumberFormat::Us)),
        _ => {
            let last_comma = token.rfind(',')?;
            let last_dot = token.rfind('.')?;
            if last_dot > last_comma {
                grouped(token, ',', Some('.')).map(|value| (value, NumberFormat::Us))
            } else {
                grouped(token, '.', Some(',')).map(|value| (value, NumberFormat::European))
            }
        }
    }
}

/// Validate thousands grouping and drop the group separator. The decimal
/// separator, when given, must appear once and after every group separator.
fn grouped(token: &str, group: char, decimal: Option<char>) -> Option<String> {
    let (int_part, frac_part) = match decimal {
        Some(decimal) => {
            let (int_part, frac_part) = token.rsplit_once(decimal)?;
            if int_part.contains(decimal) || frac_part.contains(group) {
                return None;
            }
            (int_part, Some(frac_part))
        }
        None => (token, None),
    };

    let mut groups = int_part.split(group);
    let leading = groups.next()?;
    if leading.is_empty() || leading.len() > 3 {
        return None;
    }
    let mut digits = leading.to_owned();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }

    match frac_part {
        Some(frac_part) => Some(format!("{digits}.{frac_part}")),
        None => Some(digits),
    }
}
