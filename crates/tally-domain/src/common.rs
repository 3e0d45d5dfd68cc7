//! Shared traits and money helpers.

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Exposes a stable identifier for entities held by a charge store.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Supplies a common contract for retrieving monetary amounts.
pub trait Amounted {
    fn amount(&self) -> Decimal;
}

/// Rounds a monetary value to cents, halves away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount below which a remaining balance counts as settled.
pub fn money_tolerance() -> Decimal {
    Decimal::new(9, 3)
}

/// `max(0, value)` rounded to cents.
pub fn non_negative_money(value: Decimal) -> Decimal {
    round_money(value.max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_money_uses_half_up() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn non_negative_money_floors_at_zero() {
        assert_eq!(non_negative_money(dec!(-4.2)), Decimal::ZERO);
        assert_eq!(non_negative_money(dec!(4.255)), dec!(4.26));
    }
}
