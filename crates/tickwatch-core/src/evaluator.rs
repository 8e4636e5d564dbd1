use rust_decimal::Decimal;

use crate::{display_name, Quote, ThresholdKind, ThresholdSpec, Violation};

/// Compare a quote against its bounds. Comparisons are strict, so a price
/// equal to a bound is not a violation. The upper bound is checked first and
/// at most one violation is produced.
pub fn evaluate(quote: &Quote, spec: &ThresholdSpec, name: Option<&str>) -> Option<Violation> {
    let (kind, threshold) = match (spec.upper(), spec.lower()) {
        (Some(upper), _) if quote.price > upper => (ThresholdKind::AboveUpper, upper),
        (_, Some(lower)) if quote.price < lower => (ThresholdKind::BelowLower, lower),
        _ => return None,
    };

    let display = display_name(&quote.symbol, name);
    let verb = match kind {
        ThresholdKind::AboveUpper => "reached",
        ThresholdKind::BelowLower => "dropped to",
    };
    let message = format!(
        "{display} {verb} {} (threshold: {})",
        money(quote.price),
        money(threshold)
    );

    Some(Violation {
        symbol: quote.symbol.clone(),
        name: name.map(str::to_owned).filter(|name| !name.trim().is_empty()),
        price: quote.price,
        currency: quote.currency.clone(),
        kind,
        threshold,
        message,
    })
}

fn money(value: Decimal) -> String {
    format!("${:.4}", value.round_dp(4))
}
