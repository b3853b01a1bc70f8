//! Revenue is stored as integer hundredths; the API speaks `Decimal`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{Result, StoreError};

/// Convert a two-place decimal to hundredths. Extra precision is rejected
/// rather than silently rounded.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    if amount.normalize().scale() > 2 {
        return Err(StoreError::InvalidAmount(format!(
            "{amount} has more than two decimal places"
        )));
    }
    (amount * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| StoreError::InvalidAmount(format!("{amount} is out of range")))
}

/// Hundredths back to a decimal with exactly two places.
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn two_places_are_exact() {
        assert_eq!(to_cents(Decimal::from_str("45.50").unwrap()).unwrap(), 4550);
        assert_eq!(to_cents(Decimal::from_str("-1.00").unwrap()).unwrap(), -100);
        assert_eq!(from_cents(4550).to_string(), "45.50");
        assert_eq!(from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn trailing_zeros_beyond_two_places_are_fine() {
        assert_eq!(to_cents(Decimal::from_str("12.3000").unwrap()).unwrap(), 1230);
    }

    #[test]
    fn sub_cent_precision_is_rejected() {
        assert!(to_cents(Decimal::from_str("0.005").unwrap()).is_err());
    }
}
