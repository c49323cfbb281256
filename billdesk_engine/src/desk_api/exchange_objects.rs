//! Currency conversion between the local currency and the reference currency.
//!
//! Registries price everything in the reference currency, but subscribers usually pay in the local currency. The
//! conversion applies the official rate plus a fixed markup; see [`effective_rate`].
//!
//! Conversions return full-precision values so that converting there and back lands on the starting amount. Round to
//! cents (with [`RefAmount::round_cents`] / [`LocalAmount::round_cents`]) only when displaying or submitting an amount.
//! [`ConversionRound`] does this for the payment form.
use std::fmt::Display;

use billdesk_common::{LocalAmount, RefAmount, LOCAL_CURRENCY_CODE, REFERENCE_CURRENCY_CODE};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The markup applied on top of the official rate.
pub const DEFAULT_MARKUP: Decimal = dec!(0.08);

/// Decimal places the effective rate is rounded to.
pub const RATE_PRECISION: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("Invalid exchange rate. {0}")]
    InvalidRate(String),
}

//--------------------------------------    ExchangeRate     ---------------------------------------------------------
/// Units of local currency per unit of reference currency, as published by the official quote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub value: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Create a new rate. If `observed_at` is not given, the current time is used.
    pub fn new(value: Decimal, observed_at: Option<DateTime<Utc>>) -> Self {
        let observed_at = observed_at.unwrap_or_else(Utc::now);
        Self { value, observed_at }
    }

    pub fn is_usable(&self) -> bool {
        self.value > Decimal::ZERO
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1 {REFERENCE_CURRENCY_CODE} => {:.4} {LOCAL_CURRENCY_CODE}", self.value)
    }
}

//--------------------------------------  Conversion functions  ------------------------------------------------------
/// `rate × (1 + markup)`, rounded to [`RATE_PRECISION`] decimal places.
pub fn effective_rate(rate: Decimal, markup: Decimal) -> Result<Decimal, ConversionError> {
    if rate <= Decimal::ZERO {
        return Err(ConversionError::InvalidRate(format!("The rate must be positive, but was {rate}")));
    }
    if markup.is_sign_negative() {
        return Err(ConversionError::InvalidRate(format!("The markup cannot be negative, but was {markup}")));
    }
    let effective = rate
        .checked_mul(Decimal::ONE + markup)
        .ok_or_else(|| ConversionError::InvalidRate("The effective rate is too large".into()))?
        .round_dp_with_strategy(RATE_PRECISION, RoundingStrategy::MidpointAwayFromZero);
    if effective.is_zero() {
        return Err(ConversionError::InvalidRate(format!("The rate {rate} is too small to convert with")));
    }
    Ok(effective)
}

/// Converts a local-currency amount to the reference currency: `amount_local / effective_rate`.
pub fn to_reference(
    amount_local: LocalAmount,
    rate: &ExchangeRate,
    markup: Decimal,
) -> Result<RefAmount, ConversionError> {
    if amount_local.is_negative() {
        return Err(ConversionError::InvalidAmount(format!("Cannot convert a negative amount ({amount_local})")));
    }
    let effective = effective_rate(rate.value, markup)?;
    amount_local
        .value()
        .checked_div(effective)
        .map(RefAmount::from)
        .ok_or_else(|| ConversionError::InvalidAmount(format!("{amount_local} cannot be converted")))
}

/// Converts a reference-currency amount to the local currency: `amount_reference × effective_rate`.
pub fn to_local(
    amount_reference: RefAmount,
    rate: &ExchangeRate,
    markup: Decimal,
) -> Result<LocalAmount, ConversionError> {
    if amount_reference.is_negative() {
        return Err(ConversionError::InvalidAmount(format!("Cannot convert a negative amount ({amount_reference})")));
    }
    let effective = effective_rate(rate.value, markup)?;
    amount_reference
        .value()
        .checked_mul(effective)
        .map(LocalAmount::from)
        .ok_or_else(|| ConversionError::InvalidAmount(format!("{amount_reference} is too large to convert")))
}

//--------------------------------------  CurrencyConverter   ---------------------------------------------------------
/// Conversion with a fixed markup. [`Default`] uses [`DEFAULT_MARKUP`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyConverter {
    markup: Decimal,
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self { markup: DEFAULT_MARKUP }
    }
}

impl CurrencyConverter {
    pub fn new(markup: Decimal) -> Result<Self, ConversionError> {
        if markup.is_sign_negative() {
            return Err(ConversionError::InvalidRate(format!("The markup cannot be negative, but was {markup}")));
        }
        Ok(Self { markup })
    }

    pub fn markup(&self) -> Decimal {
        self.markup
    }

    pub fn effective_rate(&self, rate: &ExchangeRate) -> Result<Decimal, ConversionError> {
        effective_rate(rate.value, self.markup)
    }

    pub fn to_reference(&self, amount_local: LocalAmount, rate: &ExchangeRate) -> Result<RefAmount, ConversionError> {
        to_reference(amount_local, rate, self.markup)
    }

    pub fn to_local(&self, amount_reference: RefAmount, rate: &ExchangeRate) -> Result<LocalAmount, ConversionError> {
        to_local(amount_reference, rate, self.markup)
    }

    /// Starts a conversion round that pins `rate` for the lifetime of one payment form.
    pub fn round(&self, rate: ExchangeRate) -> Result<ConversionRound, ConversionError> {
        self.effective_rate(&rate)?;
        Ok(ConversionRound { rate, converter: *self })
    }

    /// Prices of the standard plans at `rate`, rounded to cents.
    pub fn plan_prices(&self, rate: &ExchangeRate) -> Result<Vec<PlanPrice>, ConversionError> {
        STANDARD_PLANS
            .iter()
            .map(|&(name, price)| {
                let reference = RefAmount::from(price);
                let local = self.to_local(reference, rate)?.round_cents();
                Ok(PlanPrice { name, reference, local })
            })
            .collect()
    }
}

//--------------------------------------   ConversionRound    ---------------------------------------------------------
/// One payment form's worth of conversions, all at the same rate.
///
/// The operator types an amount into either currency and the round fills in the other one. Both sides come back
/// rounded to cents, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRound {
    rate: ExchangeRate,
    converter: CurrencyConverter,
}

impl ConversionRound {
    pub fn rate(&self) -> &ExchangeRate {
        &self.rate
    }

    pub fn effective_rate(&self) -> Result<Decimal, ConversionError> {
        self.converter.effective_rate(&self.rate)
    }

    pub fn to_reference(&self, amount_local: LocalAmount) -> Result<RefAmount, ConversionError> {
        Ok(self.converter.to_reference(amount_local, &self.rate)?.round_cents())
    }

    pub fn to_local(&self, amount_reference: RefAmount) -> Result<LocalAmount, ConversionError> {
        Ok(self.converter.to_local(amount_reference, &self.rate)?.round_cents())
    }

    /// Fills in whichever side is missing. If both are given they are kept as entered (rounded to cents), since the
    /// operator may have agreed a different local amount with the subscriber.
    pub fn complete(
        &self,
        amount_reference: Option<RefAmount>,
        amount_local: Option<LocalAmount>,
    ) -> Result<(RefAmount, LocalAmount), ConversionError> {
        match (amount_reference, amount_local) {
            (Some(r), Some(l)) => {
                if r.is_negative() || l.is_negative() {
                    return Err(ConversionError::InvalidAmount("Amounts cannot be negative".into()));
                }
                Ok((r.round_cents(), l.round_cents()))
            },
            (Some(r), None) => Ok((r.round_cents(), self.to_local(r)?)),
            (None, Some(l)) => Ok((self.to_reference(l)?, l.round_cents())),
            (None, None) => Err(ConversionError::InvalidAmount("Enter an amount in either currency".into())),
        }
    }
}

//--------------------------------------      PlanPrice       ---------------------------------------------------------
/// Reference-currency list prices of the standard service plans.
pub const STANDARD_PLANS: [(&str, Decimal); 3] = [("Basic", dec!(20)), ("Standard", dec!(25)), ("Premium", dec!(30))];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrice {
    pub name: &'static str,
    pub reference: RefAmount,
    pub local: LocalAmount,
}

impl Display for PlanPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} / {}", self.name, self.reference, self.local)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rate(value: Decimal) -> ExchangeRate {
        ExchangeRate::new(value, None)
    }

    #[test]
    fn effective_rate_is_rounded_to_four_places() {
        assert_eq!(effective_rate(dec!(36.5), DEFAULT_MARKUP).unwrap(), dec!(39.42));
        assert_eq!(effective_rate(dec!(36.12345), DEFAULT_MARKUP).unwrap(), dec!(39.0133));
        assert_eq!(effective_rate(dec!(10), Decimal::ZERO).unwrap(), dec!(10));
        assert!(matches!(effective_rate(Decimal::ZERO, DEFAULT_MARKUP), Err(ConversionError::InvalidRate(_))));
        assert!(matches!(effective_rate(dec!(-1), DEFAULT_MARKUP), Err(ConversionError::InvalidRate(_))));
        assert!(matches!(effective_rate(dec!(0.00001), DEFAULT_MARKUP), Err(ConversionError::InvalidRate(_))));
    }

    #[test]
    fn converts_both_ways() {
        let converter = CurrencyConverter::default();
        let r = rate(dec!(36.5));
        // 15.50 × 39.42
        let local = converter.to_local(RefAmount::from(dec!(15.5)), &r).unwrap();
        assert_eq!(local.value(), dec!(611.01));
        let back = converter.to_reference(local, &r).unwrap();
        assert_eq!(back.round_cents().value(), dec!(15.50));
        assert_eq!(converter.to_local(RefAmount::ZERO, &r).unwrap(), LocalAmount::ZERO);
    }

    #[test]
    fn round_trip_holds_at_cent_precision() {
        let converter = CurrencyConverter::default();
        for value in [dec!(36.5), dec!(0.73), dec!(4.1234), dec!(3571.99)] {
            let r = rate(value);
            for amount in [dec!(0.01), dec!(1), dec!(99.99), dec!(1234.56), dec!(250000)] {
                let local = LocalAmount::from(amount);
                let there = converter.to_reference(local, &r).unwrap();
                let back = converter.to_local(there, &r).unwrap();
                assert_eq!(back.round_cents(), local.round_cents(), "rate {value}, amount {amount}");
            }
        }
    }

    #[test]
    fn invalid_inputs() {
        let converter = CurrencyConverter::default();
        let r = rate(dec!(36.5));
        assert!(matches!(
            converter.to_local(RefAmount::from(dec!(-1)), &r),
            Err(ConversionError::InvalidAmount(_))
        ));
        assert!(matches!(
            converter.to_reference(LocalAmount::from(dec!(-0.01)), &r),
            Err(ConversionError::InvalidAmount(_))
        ));
        assert!(matches!(
            converter.to_reference(LocalAmount::from(dec!(10)), &rate(Decimal::ZERO)),
            Err(ConversionError::InvalidRate(_))
        ));
        assert!(CurrencyConverter::new(dec!(-0.1)).is_err());
    }

    #[test]
    fn conversion_round_fills_the_missing_side() {
        let round = CurrencyConverter::default().round(rate(dec!(36.5))).unwrap();
        let (r, l) = round.complete(Some(RefAmount::from(dec!(15.5))), None).unwrap();
        assert_eq!((r.value(), l.value()), (dec!(15.50), dec!(611.01)));
        let (r, l) = round.complete(None, Some(LocalAmount::from(dec!(100)))).unwrap();
        // 100 / 39.42 = 2.5367...
        assert_eq!((r.value(), l.value()), (dec!(2.54), dec!(100)));
        let (r, l) = round.complete(Some(RefAmount::from(dec!(10))), Some(LocalAmount::from(dec!(400.123)))).unwrap();
        assert_eq!((r.value(), l.value()), (dec!(10), dec!(400.12)));
        assert!(round.complete(None, None).is_err());
        assert!(CurrencyConverter::default().round(rate(Decimal::ZERO)).is_err());
    }

    #[test]
    fn plan_prices() {
        let prices = CurrencyConverter::default().plan_prices(&rate(dec!(36.5))).unwrap();
        let names = prices.iter().map(|p| p.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Basic", "Standard", "Premium"]);
        assert_eq!(prices[0].local.value(), dec!(788.40));
        assert_eq!(prices[1].local.value(), dec!(985.50));
        assert_eq!(prices[2].local.value(), dec!(1182.60));
    }

    #[test]
    fn display() {
        assert_eq!(rate(dec!(36.5)).to_string(), "1 USD => 36.5000 VES");
    }
}
