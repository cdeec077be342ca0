//! Atelier Core - Storefront domain library.
//!
//! This crate provides the domain model used by the Atelier storefront:
//! - `storefront` - Public-facing e-commerce site (axum + askama)
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no session handling. Everything here is deterministic given its
//! inputs, which keeps it trivially testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money and email addresses
//! - [`catalog`] - Products and the read-only catalog
//! - [`filter`] - Product listing filter (price, size, color, category)
//! - [`cart`] - Cart lines keyed by product, size and color
//! - [`pricing`] - Shipping, tax and coupon arithmetic
//! - [`checkout`] - Three-step checkout wizard
//! - [`forms`] - Validation for account and contact forms

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod filter;
pub mod forms;
pub mod pricing;
pub mod types;

pub use cart::{Cart, CartError, CartKey, CartLine, ResolvedLine};
pub use catalog::{Catalog, CatalogError, Product};
pub use checkout::{
    Checkout, CheckoutError, CheckoutStep, OrderConfirmation, PaymentDetails, PaymentSummary,
    ShippingDetails,
};
pub use filter::ProductFilter;
pub use forms::ValidationErrors;
pub use pricing::{Coupon, CouponError, OrderTotals};
pub use types::*;
