//! Shared helpers for the integration suites.

pub use tickwatch_core::Symbol;

/// Parse a symbol the suites know to be valid.
pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}
