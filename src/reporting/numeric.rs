//! Decimal parsing and display rounding for metric values

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

/// Parse a stored metric value. Sentinel text (`N/A`, `-`, blanks) is `None`.
pub fn parse_metric_value(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Two decimal places, half away from zero
pub fn round_for_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounded JSON number, or `null` when the value is absent.
///
/// Output goes through `f64`, so magnitudes above 2^53 keep only 53 bits
/// of precision. Sums and percentages are computed on the exact decimal
/// before this point.
pub fn display_value(value: Option<Decimal>) -> Value {
    value
        .map(round_for_display)
        .and_then(|rounded| rounded.to_f64())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Fixed two-decimal text form, e.g. `"12.50"`
pub fn format_fixed(value: Decimal) -> String {
    format!("{:.2}", round_for_display(value))
}
