//! Decimal rounding helpers used by the classifier and settlement writer.
//!
//! Every amount is rescaled to the configured engine precision before it is
//! compared against zero, so that dust below the engine's smallest
//! representable unit is never mistaken for a meaningful deposit.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Round `value` down (toward zero) to `precision` decimal places.
pub fn round_floor(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::ToZero)
}

/// True if `value` rounds to zero at `precision` decimal places — the
/// classifier's definition of "not economically meaningful".
pub fn rounds_to_zero(value: Decimal, precision: u32) -> bool {
    round_floor(value, precision).is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn floors_toward_zero() {
        assert_eq!(round_floor(dec!(1.23456), 2), dec!(1.23));
        assert_eq!(round_floor(dec!(0.00001), 2), dec!(0.00));
    }

    #[test]
    fn detects_dust() {
        assert!(rounds_to_zero(dec!(0.0000001), 6));
        assert!(!rounds_to_zero(dec!(0.000001), 6));
    }
}
