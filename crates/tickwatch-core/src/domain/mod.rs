//! # Domain Models
//!
//! Canonical domain types for price acquisition and threshold evaluation.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated ticker or ISIN, with shape and region hint |
//! | [`Quote`] | Parsed, timestamped price from one source |
//! | [`ThresholdSpec`] | Upper/lower bounds for a symbol |
//! | [`Violation`] | A quote outside its bounds |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All types validate their invariants at construction time, so a `Quote`
//! never carries a negative price and a `ThresholdSpec` always has at least
//! one bound.

mod models;
mod symbol;
mod threshold;
mod timestamp;

pub use models::{validate_currency_code, Quote};
pub use symbol::{Listing, Symbol, SymbolShape};
pub use threshold::{display_name, ThresholdKind, ThresholdSpec, Violation};
pub use timestamp::UtcDateTime;
