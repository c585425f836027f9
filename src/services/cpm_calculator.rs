//! Converts a view delta into dollars at a per-thousand rate

use rust_decimal::{Decimal, RoundingStrategy};

const VIEWS_PER_MILLE: i64 = 1000;

/// Round a currency amount to cents, halves away from zero
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Uncapped earnings for `delta` views at `rate_per_thousand` dollars.
///
/// The division and multiplication run in exact decimal arithmetic and the
/// result is rounded once at the end.
pub fn earned_for_delta(delta: i64, rate_per_thousand: Decimal) -> Decimal {
    if delta <= 0 {
        return Decimal::ZERO;
    }
    round_currency(Decimal::from(delta) * rate_per_thousand / Decimal::from(VIEWS_PER_MILLE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_five_thousand_views_at_one_fifty() {
        assert_eq!(earned_for_delta(5_000, dec!(1.50)), dec!(7.50));
    }

    #[test]
    fn test_rounds_half_up() {
        // 3 views * 1.50 / 1000 = 0.0045 -> 0.00
        assert_eq!(earned_for_delta(3, dec!(1.50)), dec!(0.00));
        // 5 views * 1.00 / 1000 = 0.005 -> 0.01
        assert_eq!(earned_for_delta(5, dec!(1.00)), dec!(0.01));
        // 2573 views * 1.50 / 1000 = 3.8595 -> 3.86
        assert_eq!(earned_for_delta(2_573, dec!(1.50)), dec!(3.86));
    }

    #[test]
    fn test_zero_and_negative_deltas_earn_nothing() {
        assert_eq!(earned_for_delta(0, dec!(1.50)), Decimal::ZERO);
        assert_eq!(earned_for_delta(-40, dec!(1.50)), Decimal::ZERO);
    }

    #[test]
    fn test_large_delta_is_exact() {
        assert_eq!(earned_for_delta(123_456_789, dec!(1.50)), dec!(185185.18));
    }
}
