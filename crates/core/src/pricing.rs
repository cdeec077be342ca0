//! Shipping, tax and coupon arithmetic.
//!
//! All formulas are fixed:
//!
//! ```text
//! shipping = 0 if subtotal >= $75.00 else $5.99
//! tax      = round(subtotal * 8%)
//! discount = round(subtotal * coupon rate)
//! total    = subtotal - discount + shipping + tax
//! ```
//!
//! Shipping and tax are computed on the pre-discount subtotal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Money;

/// Subtotal at or above which standard shipping is free.
pub const SHIPPING_FREE_THRESHOLD: Money = Money::from_cents(7500);

/// Standard shipping charged below the free threshold.
pub const SHIPPING_FLAT_RATE: Money = Money::from_cents(599);

/// Sales tax rate in basis points.
pub const TAX_RATE_BPS: u32 = 800;

/// Shipping charge for a subtotal.
#[must_use]
pub fn shipping_for(subtotal: Money) -> Money {
    if subtotal >= SHIPPING_FREE_THRESHOLD {
        Money::ZERO
    } else {
        SHIPPING_FLAT_RATE
    }
}

/// Sales tax for a subtotal.
#[must_use]
pub fn tax_for(subtotal: Money) -> Money {
    subtotal.percent_of(TAX_RATE_BPS)
}

/// Errors from coupon lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon code is empty")]
    Empty,
    #[error("invalid coupon code: {0}")]
    Unknown(String),
}

/// A recognised coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coupon {
    /// 10% off the subtotal.
    Save10,
}

impl Coupon {
    /// Look up a coupon by code, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Empty` for a blank code and
    /// `CouponError::Unknown` for anything unrecognised.
    pub fn parse(code: &str) -> Result<Self, CouponError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CouponError::Empty);
        }

        match code.to_ascii_uppercase().as_str() {
            "SAVE10" => Ok(Self::Save10),
            _ => Err(CouponError::Unknown(code.to_string())),
        }
    }

    /// Canonical code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Save10 => "SAVE10",
        }
    }

    /// Discount rate in basis points.
    #[must_use]
    pub const fn rate_bps(self) -> u32 {
        match self {
            Self::Save10 => 1000,
        }
    }

    /// Discount for a subtotal.
    #[must_use]
    pub fn discount_for(self, subtotal: Money) -> Money {
        subtotal.percent_of(self.rate_bps())
    }
}

/// Order totals derived from a cart subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Compute totals for a subtotal and optional coupon.
    #[must_use]
    pub fn compute(subtotal: Money, coupon: Option<Coupon>) -> Self {
        let discount = coupon.map_or(Money::ZERO, |c| c.discount_for(subtotal));
        let shipping = shipping_for(subtotal);
        let tax = tax_for(subtotal);

        Self {
            subtotal,
            discount,
            shipping,
            tax,
            total: subtotal - discount + shipping + tax,
        }
    }

    /// Whether standard shipping is free.
    #[must_use]
    pub const fn free_shipping(&self) -> bool {
        self.shipping.is_zero()
    }

    /// How much more needs to be spent to qualify for free shipping.
    #[must_use]
    pub fn amount_to_free_shipping(&self) -> Money {
        SHIPPING_FREE_THRESHOLD.saturating_sub(self.subtotal)
    }
}
