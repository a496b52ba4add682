//! Fee calculation.
//!
//! Rates are `Decimal` fractions (e.g. `0.001` = 0.10%), matching
//! `FeeConfig` in [`crate::config`].

use rust_decimal::Decimal;

use crate::core_types::Liquidity;
use crate::config::FeeConfig;

/// Fee owed on `amount` at the given `rate`.
#[inline]
pub fn calculate_fee(amount: Decimal, rate: Decimal) -> Decimal {
    amount * rate
}

/// Rate applicable to a trade's liquidity role.
#[inline]
pub fn rate_for(liquidity: Liquidity, fees: &FeeConfig) -> Decimal {
    match liquidity {
        Liquidity::Maker => fees.maker_rate,
        Liquidity::Taker => fees.taker_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn calculates_basic_fee() {
        assert_eq!(calculate_fee(dec!(100), dec!(0.002)), dec!(0.200));
    }

    #[test]
    fn zero_amount_zero_fee() {
        assert_eq!(calculate_fee(dec!(0), dec!(0.002)), dec!(0));
    }

    #[test]
    fn selects_rate_by_liquidity() {
        let fees = FeeConfig {
            maker_rate: dec!(0.001),
            taker_rate: dec!(0.002),
        };
        assert_eq!(rate_for(Liquidity::Maker, &fees), dec!(0.001));
        assert_eq!(rate_for(Liquidity::Taker, &fees), dec!(0.002));
    }
}
