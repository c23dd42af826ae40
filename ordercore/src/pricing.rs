//! Pricing policy: subtotal → tax → total.
//!
//! Pure computation over snapshotted amounts; no storage access. The tax
//! rate is configuration supplied at construction, defaulting to the flat
//! 10% placeholder rate.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};
use crate::types::Money;

/// Fractional tax rate in `[0, 1]` with at most four decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Creates a tax rate, rejecting values outside `[0, 1]` and rates more
    /// precise than four decimal places.
    pub fn new(rate: Decimal) -> ValidationResult<Self> {
        if rate.is_sign_negative() || rate > Decimal::ONE {
            return Err(ValidationError::InvalidTaxRate(format!(
                "rate must be between 0 and 1, got {rate}"
            )));
        }
        if rate.scale() > 4 {
            return Err(ValidationError::InvalidTaxRate(format!(
                "rate cannot have more than 4 decimal places: {rate}"
            )));
        }
        Ok(Self(rate))
    }

    /// Returns the underlying fraction.
    pub const fn value(self) -> Decimal {
        self.0
    }
}

impl Default for TaxRate {
    /// The flat placeholder rate of 10%.
    fn default() -> Self {
        Self(Decimal::new(10, 2))
    }
}

impl std::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three monetary figures snapshotted onto an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Sum of line totals.
    pub subtotal: Money,
    /// Tax on the subtotal, rounded half-up to two places.
    pub tax: Money,
    /// Subtotal plus tax.
    pub total: Money,
}

/// Computes order totals from a subtotal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingPolicy {
    rate: TaxRate,
}

impl PricingPolicy {
    /// Creates a policy with the given rate.
    pub const fn new(rate: TaxRate) -> Self {
        Self { rate }
    }

    /// The configured rate.
    pub const fn rate(&self) -> TaxRate {
        self.rate
    }

    /// Tax on a subtotal: `round(subtotal × rate, 2, half-up)`.
    pub fn tax(&self, subtotal: Money) -> Money {
        let raw = subtotal.amount() * self.rate.0;
        let rounded = raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        // Rate ≤ 1 and the subtotal is valid money, so the rounded product
        // is non-negative, two-place, and within range.
        Money::new(rounded).expect("tax on valid money should be valid money")
    }

    /// Subtotal plus tax. Fails only when the sum leaves the representable
    /// money range.
    pub fn total(&self, subtotal: Money) -> ValidationResult<Money> {
        subtotal.checked_add(self.tax(subtotal))
    }

    /// Computes the full quote snapshotted onto an order.
    pub fn quote(&self, subtotal: Money) -> ValidationResult<PriceQuote> {
        let tax = self.tax(subtotal);
        let total = subtotal.checked_add(tax)?;
        Ok(PriceQuote {
            subtotal,
            tax,
            total,
        })
    }
}
