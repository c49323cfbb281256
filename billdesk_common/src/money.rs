use std::{fmt::Display, iter::Sum, str::FromStr};

use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::op;

/// The currency that balances and plan prices are denominated in.
pub const REFERENCE_CURRENCY_CODE: &str = "USD";
/// The currency that cash and local payment methods are entered in.
pub const LOCAL_CURRENCY_CODE: &str = "VES";

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct AmountConversionError(String);

macro_rules! amount_type {
    ($(#[$meta:meta])* $name:ident, $code:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Decimal);

        op!(binary $name, Add, add);
        op!(binary $name, Sub, sub);
        op!(inplace $name, AddAssign, add_assign);
        op!(inplace $name, SubAssign, sub_assign);
        op!(unary $name, Neg, neg);

        impl $name {
            pub const ZERO: Self = Self(Decimal::ZERO);

            pub fn new(value: Decimal) -> Self {
                Self(value)
            }

            pub fn value(&self) -> Decimal {
                self.0
            }

            pub fn currency_code(&self) -> &'static str {
                $code
            }

            /// Strictly greater than zero.
            pub fn is_positive(&self) -> bool {
                self.0 > Decimal::ZERO
            }

            pub fn is_negative(&self) -> bool {
                self.0 < Decimal::ZERO
            }

            /// Rounds to two decimal places, midpoints away from zero.
            pub fn round_cents(&self) -> Self {
                Self(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(Decimal::from(value))
            }
        }

        impl TryFrom<f64> for $name {
            type Error = AmountConversionError;

            fn try_from(value: f64) -> Result<Self, Self::Error> {
                if !value.is_finite() {
                    return Err(AmountConversionError(format!("{value} is not a finite number")));
                }
                Decimal::from_f64(value)
                    .map(Self)
                    .ok_or_else(|| AmountConversionError(format!("{value} is out of range")))
            }
        }

        impl FromStr for $name {
            type Err = AmountConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Decimal::from_str(s.trim())
                    .map(Self)
                    .map_err(|e| AmountConversionError(format!("'{s}' is not a valid amount. {e}")))
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::default(), |acc, v| acc + v)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.2} {}", self.0, $code)
            }
        }
    };
}

amount_type!(
    /// An amount in the reference currency (the currency balances are kept in).
    RefAmount,
    REFERENCE_CURRENCY_CODE
);

amount_type!(
    /// An amount in the local currency.
    LocalAmount,
    LOCAL_CURRENCY_CODE
);

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn arithmetic_and_display() {
        let mut balance = RefAmount::from(dec!(-15.5));
        assert!(balance.is_negative());
        balance += RefAmount::from(dec!(15.5));
        assert_eq!(balance, RefAmount::ZERO);
        assert!(!balance.is_positive());
        assert_eq!(format!("{}", RefAmount::from(dec!(20))), "20.00 USD");
        assert_eq!(format!("{}", LocalAmount::from(dec!(1234.567))), "1234.57 VES");
        let total: LocalAmount = [1, 2, 3].into_iter().map(LocalAmount::from).sum();
        assert_eq!(total, LocalAmount::from(6));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(RefAmount::from(dec!(2.345)).round_cents().value(), dec!(2.35));
        assert_eq!(RefAmount::from(dec!(-2.345)).round_cents().value(), dec!(-2.35));
        assert_eq!(RefAmount::from(dec!(2.344)).round_cents().value(), dec!(2.34));
    }

    #[test]
    fn conversions() {
        assert!(RefAmount::try_from(f64::NAN).is_err());
        assert!(RefAmount::try_from(f64::INFINITY).is_err());
        assert_eq!(RefAmount::try_from(15.5).unwrap().value(), dec!(15.5));
        assert_eq!("  42.10 ".parse::<LocalAmount>().unwrap().value(), dec!(42.10));
        assert!("forty".parse::<LocalAmount>().is_err());
        let parsed: RefAmount = serde_json::from_str("-15.5").unwrap();
        assert_eq!(parsed.value(), dec!(-15.5));
    }
}
