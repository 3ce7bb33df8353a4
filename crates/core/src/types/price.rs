//! Type-safe price representation using decimal arithmetic.
//!
//! Supabase stores prices in major units (dollars), Stripe in minor units
//! (cents). `Price` keeps a `Decimal` in major units and converts at the edge.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero USD price.
    #[must_use]
    pub const fn zero() -> Self {
        Self::usd(Decimal::ZERO)
    }

    /// Create a USD price from a major-unit amount.
    #[must_use]
    pub const fn usd(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::USD)
    }

    /// Create a USD price from cents, e.g. `2999` becomes `$29.99`.
    #[must_use]
    pub fn from_minor_units(cents: i64) -> Self {
        Self::usd(Decimal::new(cents, 2))
    }

    /// Amount in minor units, rounded half away from zero.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        self.amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Multiply by a line quantity, saturating at the `Decimal` bounds.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(
            self.amount.saturating_mul(Decimal::from(quantity)),
            self.currency_code,
        )
    }

    /// Apply a whole-number percentage (e.g. `20` for 20%).
    #[must_use]
    pub fn percent(self, pct: u32) -> Self {
        let hundredths = self.amount / Decimal::ONE_HUNDRED;
        Self::new(hundredths.saturating_mul(Decimal::from(pct)), self.currency_code)
    }

    /// Round to whole cents, half away from zero.
    #[must_use]
    pub fn round_cents(self) -> Self {
        Self::new(
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            self.currency_code,
        )
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            format!("-{}{:.2}", self.currency_code.symbol(), rounded.abs())
        } else {
            format!("{}{:.2}", self.currency_code.symbol(), rounded)
        }
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.amount.saturating_add(rhs.amount), self.currency_code)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.amount.saturating_sub(rhs.amount), self.currency_code)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        self.times(rhs)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

/// Serde adapter for `Price` fields that travel as a plain JSON number in
/// major units, e.g. `"price": 29.99`. Deserialized prices are USD.
pub mod as_number {
    use rust_decimal::Decimal;
    use serde::{Deserializer, Serializer};

    use super::Price;

    pub fn serialize<S: Serializer>(price: &Price, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&price.amount, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Price, D::Error> {
        let amount: Decimal = rust_decimal::serde::float::deserialize(deserializer)?;
        Ok(Price::usd(amount))
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Lower-case code as Stripe expects it.
    #[must_use]
    pub const fn stripe_code(&self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    #[derive(Deserialize)]
    struct Wrapped {
        #[serde(with = "as_number")]
        price: Price,
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(Price::from_minor_units(2999).amount, dec("29.99"));
        assert_eq!(Price::from_minor_units(0).amount, Decimal::ZERO);
        assert_eq!(Price::from_minor_units(-150).amount, dec("-1.50"));
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        assert_eq!(Price::usd(dec("29.99")).to_minor_units(), Some(2999));
        assert_eq!(Price::usd(dec("10.005")).to_minor_units(), Some(1001));
        assert_eq!(Price::usd(dec("10.004")).to_minor_units(), Some(1000));
    }

    #[test]
    fn test_to_minor_units_out_of_range() {
        // deserialized from a client payload of `1e27`
        let huge: Price =
            serde_json::from_str::<Wrapped>(r#"{"price": 1e27}"#).expect("deserialize").price;
        assert_eq!(huge.to_minor_units(), None);
        assert_eq!(Price::usd(Decimal::MAX).to_minor_units(), None);
    }

    #[test]
    fn test_arithmetic_saturates() {
        let max = Price::usd(Decimal::MAX);
        assert_eq!(max.times(3).amount, Decimal::MAX);
        assert_eq!((max + max).amount, Decimal::MAX);
        assert_eq!((Price::usd(Decimal::MIN) - max).amount, Decimal::MIN);
        assert_eq!([max, max].into_iter().sum::<Price>().amount, Decimal::MAX);
        assert_eq!(max.percent(20).to_minor_units(), None);
        assert_eq!(Price::usd(dec("89.97")).percent(20).round_cents(), Price::usd(dec("17.99")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::usd(dec("29.9")).display(), "$29.90");
        assert_eq!(Price::usd(dec("0")).display(), "$0.00");
        assert_eq!(Price::usd(dec("-5")).display(), "-$5.00");
        assert_eq!(
            Price::new(dec("12.5"), CurrencyCode::EUR).to_string(),
            "€12.50"
        );
    }

    #[test]
    fn test_arithmetic() {
        let a = Price::usd(dec("29.99"));
        let b = Price::usd(dec("34.99"));
        assert_eq!((a + b).amount, dec("64.98"));
        assert_eq!((a * 3).amount, dec("89.97"));
        assert_eq!(Price::usd(dec("100")).percent(20).amount, dec("20"));

        let total: Price = vec![a, b].into_iter().sum();
        assert_eq!(total.amount, dec("64.98"));
    }
}
