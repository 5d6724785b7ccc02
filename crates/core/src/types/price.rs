//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are snapshots of what the catalog displayed when a line was
//! added to the cart; arithmetic here exists for cart totals, not for
//! live pricing.

use std::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
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

    /// A zero price in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::zero(CurrencyCode::default())
    }
}

/// Line total: unit price times quantity.
impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }
}

/// Summation for cart totals. Mixed-currency carts are not modeled;
/// the left-hand currency is kept.
impl Add for Price {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.amount + other.amount, self.currency_code)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn usd(amount: &str) -> Price {
        Price::new(amount.parse().unwrap(), CurrencyCode::USD)
    }

    #[test]
    fn test_line_total_is_price_times_quantity() {
        let total = usd("19.99") * 3;
        assert_eq!(total, usd("59.97"));
    }

    #[test]
    fn test_multiply_by_zero_quantity() {
        assert_eq!(usd("19.99") * 0, usd("0"));
    }

    #[test]
    fn test_sum_keeps_currency() {
        let sum = usd("1.50") + usd("2.25");
        assert_eq!(sum.amount, "3.75".parse().unwrap());
        assert_eq!(sum.currency_code, CurrencyCode::USD);
    }
}
