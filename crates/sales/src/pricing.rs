//! Order pricing: subtotal, shipping, tax and total.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Money, ValueObject};

/// Pricing parameters, loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Shipping is free when the subtotal is strictly greater than this.
    pub free_shipping_threshold: Money,
    pub flat_shipping_fee: Money,
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_units(100),
            flat_shipping_fee: Money::from_units(15),
            tax_rate: Decimal::new(8, 2),
        }
    }
}

/// The four amounts stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl ValueObject for PriceBreakdown {}

impl PriceBreakdown {
    /// `total == subtotal + shipping + tax`.
    pub fn is_consistent(&self) -> bool {
        self.subtotal + self.shipping + self.tax == self.total
    }
}

impl PricingPolicy {
    pub fn validate(&self) -> DomainResult<()> {
        if self.free_shipping_threshold.is_negative() {
            return Err(DomainError::validation("free shipping threshold must not be negative"));
        }
        if self.flat_shipping_fee.is_negative() {
            return Err(DomainError::validation("flat shipping fee must not be negative"));
        }
        if self.tax_rate.is_sign_negative() && !self.tax_rate.is_zero() {
            return Err(DomainError::validation("tax rate must not be negative"));
        }
        Ok(())
    }

    /// Price a set of `(quantity, unit price)` lines. Order of lines is irrelevant.
    pub fn price<I>(&self, lines: I) -> PriceBreakdown
    where
        I: IntoIterator<Item = (u32, Money)>,
    {
        let subtotal: Money = lines
            .into_iter()
            .map(|(quantity, unit_price)| unit_price.times(quantity))
            .sum();

        let shipping = if subtotal > self.free_shipping_threshold {
            Money::ZERO
        } else {
            self.flat_shipping_fee
        };

        let tax = subtotal.apply_rate(self.tax_rate);

        PriceBreakdown {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}
