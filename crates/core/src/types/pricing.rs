//! Product pricing rules and order total computation.
//!
//! Amounts are `rust_decimal::Decimal` in the currency's standard unit
//! (dollars, not cents). Conversion to minor units happens only at the
//! payment-provider boundary via [`to_minor_units`].
//!
//! # Order totals
//!
//! ```text
//! total = round( Σ(offer_price × quantity) × (1 + TAX_RATE) )
//! ```
//!
//! Rounding is to whole currency units, midpoint away from zero, which for
//! the non-negative amounts handled here matches `Math.round`.
//!
//! ```
//! use instabasket_core::pricing::{LineAmount, order_total};
//! use rust_decimal::Decimal;
//!
//! let lines = [LineAmount::new(Decimal::from(10), 2)];
//! assert_eq!(order_total(&lines), Decimal::from(20)); // round(20 × 1.02)
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Flat sales tax applied to every order, in percent.
pub const TAX_RATE_PERCENT: u32 = 2;

/// Decimal places a catalog amount may carry.
pub const PRICE_SCALE: u32 = 2;

/// Largest catalog amount the price columns can hold (`NUMERIC(12, 2)`).
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Errors raised when a price pair violates the catalog rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// Price or offer price is below zero.
    #[error("prices must not be negative")]
    Negative,
    /// Amount has more than [`PRICE_SCALE`] decimal places.
    #[error("prices must have at most 2 decimal places")]
    TooPrecise,
    /// Amount exceeds [`MAX_PRICE`].
    #[error("prices must not exceed 9999999999.99")]
    TooLarge,
    /// Offer price is not strictly below the list price.
    #[error("offer price ({offer_price}) must be less than price ({price})")]
    OfferNotBelowPrice {
        /// List price.
        price: Decimal,
        /// Offer price.
        offer_price: Decimal,
    },
}

/// A validated list price / offer price pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPricing {
    price: Decimal,
    offer_price: Decimal,
}

impl ProductPricing {
    /// Validate a price pair.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Negative`] if either amount is below zero,
    /// [`PricingError::TooPrecise`] or [`PricingError::TooLarge`] if an amount
    /// cannot be stored as is, and [`PricingError::OfferNotBelowPrice`] unless
    /// `offer_price < price`.
    pub fn new(price: Decimal, offer_price: Decimal) -> Result<Self, PricingError> {
        if price.is_sign_negative() || offer_price.is_sign_negative() {
            return Err(PricingError::Negative);
        }
        if price.normalize().scale() > PRICE_SCALE || offer_price.normalize().scale() > PRICE_SCALE
        {
            return Err(PricingError::TooPrecise);
        }
        if price > MAX_PRICE || offer_price > MAX_PRICE {
            return Err(PricingError::TooLarge);
        }
        if offer_price >= price {
            return Err(PricingError::OfferNotBelowPrice { price, offer_price });
        }
        Ok(Self { price, offer_price })
    }

    /// The list price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// The price the customer actually pays.
    #[must_use]
    pub const fn offer_price(&self) -> Decimal {
        self.offer_price
    }
}

/// One priced order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    /// Unit offer price at the time of ordering.
    pub unit_price: Decimal,
    /// Number of units.
    pub quantity: u32,
}

impl LineAmount {
    /// Create a new priced line.
    #[must_use]
    pub const fn new(unit_price: Decimal, quantity: u32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// `1 + TAX_RATE` as an exact decimal.
#[must_use]
pub fn tax_multiplier() -> Decimal {
    Decimal::ONE + Decimal::new(i64::from(TAX_RATE_PERCENT), 2)
}

/// Sum of all line totals, before tax.
#[must_use]
pub fn subtotal(lines: &[LineAmount]) -> Decimal {
    lines.iter().map(LineAmount::total).sum()
}

/// Order total including tax, rounded to whole currency units.
#[must_use]
pub fn order_total(lines: &[LineAmount]) -> Decimal {
    (subtotal(lines) * tax_multiplier())
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount to the provider's minor units (cents).
///
/// Returns `None` if the amount does not fit in an `i64` after scaling.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
