//! Three-step checkout wizard.
//!
//! Steps run strictly in order: shipping, then payment, then review. Going
//! back keeps what was already entered. Placing the order turns the wizard and
//! the cart into an [`OrderConfirmation`]; no payment is captured.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cart::Cart;
use crate::catalog::Catalog;
use crate::forms::ValidationErrors;
use crate::pricing::{Coupon, OrderTotals};
use crate::types::{Money, OrderNumber, ProductId};

/// Destination countries accepted at checkout.
pub const COUNTRIES: [(&str, &str); 4] = [
    ("US", "United States"),
    ("CA", "Canada"),
    ("UK", "United Kingdom"),
    ("EU", "European Union"),
];

/// Errors from wizard transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// A step was submitted while the wizard was on a different one.
    #[error("checkout is on step {actual}, not {expected}")]
    OutOfOrder {
        expected: CheckoutStep,
        actual: CheckoutStep,
    },

    /// The order would contain nothing.
    #[error("cart is empty")]
    EmptyCart,

    /// Submitted details failed validation.
    #[error("invalid checkout details")]
    Invalid(ValidationErrors),
}

/// A wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CheckoutStep {
    Shipping = 1,
    Payment = 2,
    Review = 3,
}

impl CheckoutStep {
    /// 1-based step number for the progress indicator.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Heading for the step.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Shipping => "Shipping Information",
            Self::Payment => "Payment Details",
            Self::Review => "Review Your Order",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Shipping address entered in step 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    #[serde(default)]
    pub save_address: bool,
}

impl ShippingDetails {
    /// Validate and normalise the address.
    ///
    /// # Errors
    ///
    /// Returns the field errors when any field is invalid.
    pub fn validate(mut self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.min_chars("full_name", &self.full_name, 2, "Name is required");
        errors.min_chars("address", &self.address, 5, "Address is required");
        errors.min_chars("city", &self.city, 2, "City is required");
        errors.min_chars("state", &self.state, 2, "State is required");
        errors.min_chars("zip", &self.zip, 5, "ZIP code is required");
        if !COUNTRIES.iter().any(|(code, _)| *code == self.country.trim()) {
            errors.add("country", "Select a country");
        }
        errors.into_result()?;

        for field in [
            &mut self.full_name,
            &mut self.address,
            &mut self.city,
            &mut self.state,
            &mut self.zip,
            &mut self.country,
        ] {
            *field = field.trim().to_string();
        }
        Ok(self)
    }

    /// Full name of the selected country.
    #[must_use]
    pub fn country_name(&self) -> &str {
        COUNTRIES
            .iter()
            .find(|(code, _)| *code == self.country)
            .map_or(self.country.as_str(), |(_, name)| name)
    }
}

/// Card details entered in step 2.
///
/// Only ever held for the duration of a request; see [`PaymentSummary`].
#[derive(Clone, Default, Deserialize)]
pub struct PaymentDetails {
    pub card_name: String,
    pub card_number: String,
    pub expiry: String,
    pub cvv: String,
    #[serde(default)]
    pub billing_same: bool,
}

impl PaymentDetails {
    /// Validate the card and reduce it to what may be kept.
    ///
    /// # Errors
    ///
    /// Returns the field errors when any field is invalid.
    pub fn validate(&self) -> Result<PaymentSummary, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.min_chars("card_name", &self.card_name, 2, "Name on card is required");

        let number = self.card_number.trim();
        let digits: String = number.chars().filter(char::is_ascii_digit).collect();
        let well_formed = number.chars().all(|c| c.is_ascii_digit() || c == ' ');
        if !well_formed || !(16..=19).contains(&number.len()) || digits.len() < 16 {
            errors.add("card_number", "Invalid card number");
        }

        if !is_valid_expiry(self.expiry.trim()) {
            errors.add("expiry", "Invalid expiry date (MM/YY)");
        }

        let cvv = self.cvv.trim();
        if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
            errors.add("cvv", "Invalid CVV");
        }

        errors.into_result()?;

        let last4 = digits
            .get(digits.len().saturating_sub(4)..)
            .unwrap_or_default()
            .to_string();

        Ok(PaymentSummary {
            card_name: self.card_name.trim().to_string(),
            last4,
            billing_same: self.billing_same,
        })
    }
}

impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_name", &self.card_name)
            .field("card_number", &"[REDACTED]")
            .field("expiry", &"[REDACTED]")
            .field("cvv", &"[REDACTED]")
            .field("billing_same", &self.billing_same)
            .finish()
    }
}

fn is_valid_expiry(expiry: &str) -> bool {
    let Some((month, year)) = expiry.split_once('/') else {
        return false;
    };
    let two_digits = |s: &str| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit());
    if !two_digits(month) || !two_digits(year) {
        return false;
    }
    matches!(month.parse::<u8>(), Ok(1..=12))
}

/// What is kept of the card once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub card_name: String,
    pub last4: String,
    pub billing_same: bool,
}

impl PaymentSummary {
    /// Masked card number, e.g. `•••• 4242`.
    #[must_use]
    pub fn masked(&self) -> String {
        format!("•••• {}", self.last4)
    }
}

/// A line of a placed order, priced at the time of placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub size: String,
    pub color: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub number: OrderNumber,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub coupon: Option<Coupon>,
    pub shipping: ShippingDetails,
    pub payment: PaymentSummary,
    pub placed_at: DateTime<Utc>,
}

/// Wizard state, stored in the visitor's session between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    step: CheckoutStep,
    shipping: Option<ShippingDetails>,
    payment: Option<PaymentSummary>,
}

impl Default for Checkout {
    fn default() -> Self {
        Self::new()
    }
}

impl Checkout {
    /// Start at the shipping step.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            step: CheckoutStep::Shipping,
            shipping: None,
            payment: None,
        }
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// Shipping details entered so far.
    #[must_use]
    pub const fn shipping(&self) -> Option<&ShippingDetails> {
        self.shipping.as_ref()
    }

    /// Payment summary entered so far.
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentSummary> {
        self.payment.as_ref()
    }

    fn expect_step(&self, expected: CheckoutStep) -> Result<(), CheckoutError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(CheckoutError::OutOfOrder {
                expected,
                actual: self.step,
            })
        }
    }

    /// Submit step 1 and advance to payment.
    ///
    /// # Errors
    ///
    /// `OutOfOrder` when not on the shipping step, `Invalid` when the
    /// address does not validate.
    pub fn submit_shipping(&mut self, details: ShippingDetails) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Shipping)?;
        let details = details.validate().map_err(CheckoutError::Invalid)?;
        self.shipping = Some(details);
        self.step = CheckoutStep::Payment;
        Ok(())
    }

    /// Submit step 2 and advance to review.
    ///
    /// # Errors
    ///
    /// `OutOfOrder` when not on the payment step, `Invalid` when the card
    /// does not validate.
    pub fn submit_payment(&mut self, details: &PaymentDetails) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Payment)?;
        if self.shipping.is_none() {
            return Err(CheckoutError::OutOfOrder {
                expected: CheckoutStep::Payment,
                actual: CheckoutStep::Shipping,
            });
        }
        let summary = details.validate().map_err(CheckoutError::Invalid)?;
        self.payment = Some(summary);
        self.step = CheckoutStep::Review;
        Ok(())
    }

    /// Go back one step. Entered details are kept.
    pub fn back(&mut self) -> CheckoutStep {
        self.step = match self.step {
            CheckoutStep::Review => CheckoutStep::Payment,
            CheckoutStep::Payment | CheckoutStep::Shipping => CheckoutStep::Shipping,
        };
        self.step
    }

    /// Place the order at current catalog prices.
    ///
    /// # Errors
    ///
    /// `OutOfOrder` when not on the review step, `EmptyCart` when no cart
    /// line resolves to a product.
    pub fn place_order(
        self,
        cart: &Cart,
        catalog: &Catalog,
        coupon: Option<Coupon>,
    ) -> Result<OrderConfirmation, CheckoutError> {
        self.expect_step(CheckoutStep::Review)?;
        let (Some(shipping), Some(payment)) = (self.shipping, self.payment) else {
            return Err(CheckoutError::OutOfOrder {
                expected: CheckoutStep::Review,
                actual: CheckoutStep::Shipping,
            });
        };

        let items: Vec<OrderItem> = cart
            .resolve(catalog)
            .into_iter()
            .map(|r| OrderItem {
                product_id: r.product.id.clone(),
                name: r.product.name.clone(),
                image: r.product.primary_image().to_string(),
                size: r.line.size.clone(),
                color: r.line.color.clone(),
                quantity: r.line.quantity,
                unit_price: r.product.price,
                line_total: r.line_total,
            })
            .collect();

        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let subtotal = items.iter().map(|i| i.line_total).sum();

        Ok(OrderConfirmation {
            number: new_order_number(),
            items,
            totals: OrderTotals::compute(subtotal, coupon),
            coupon,
            shipping,
            payment,
            placed_at: Utc::now(),
        })
    }
}

fn new_order_number() -> OrderNumber {
    let id = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    OrderNumber::new(format!("AT-{}", id.get(..10).unwrap_or(&id)))
}
