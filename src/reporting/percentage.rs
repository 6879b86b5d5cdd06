use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::numeric::format_fixed;

/// Expresses component totals as percentages of a base total.
pub struct PercentageDeriver;

impl PercentageDeriver {
    /// Every percentage is `"0.00"` when `base <= 0`.
    pub fn derive(
        base: Decimal,
        components: &BTreeMap<String, Decimal>,
    ) -> BTreeMap<String, String> {
        components
            .iter()
            .map(|(name, value)| (name.clone(), Self::percentage(base, *value)))
            .collect()
    }

    pub fn percentage(base: Decimal, value: Decimal) -> String {
        if base <= Decimal::ZERO {
            return format_fixed(Decimal::ZERO);
        }
        match value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(base))
        {
            Some(pct) => format_fixed(pct),
            None => {
                tracing::warn!(%base, %value, "percentage overflowed decimal range");
                format_fixed(Decimal::ZERO)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(pairs: &[(&str, i64)]) -> BTreeMap<String, Decimal> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), Decimal::from(*value)))
            .collect()
    }

    #[test]
    fn test_zero_base_yields_zero_percentages() {
        let derived = PercentageDeriver::derive(
            Decimal::ZERO,
            &components(&[("downtime_power", 10), ("downtime_other", 0)]),
        );
        assert_eq!(derived["downtime_power"], "0.00");
        assert_eq!(derived["downtime_other"], "0.00");
    }

    #[test]
    fn test_negative_base_yields_zero_percentages() {
        let derived = PercentageDeriver::derive(
            Decimal::from(-5),
            &components(&[("downtime_power", 10)]),
        );
        assert_eq!(derived["downtime_power"], "0.00");
    }

    #[test]
    fn test_percentages_have_two_places() {
        let derived = PercentageDeriver::derive(
            Decimal::from(300),
            &components(&[("a", 100), ("b", 150), ("c", 300)]),
        );
        assert_eq!(derived["a"], "33.33");
        assert_eq!(derived["b"], "50.00");
        assert_eq!(derived["c"], "100.00");
    }
}
