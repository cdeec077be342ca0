//! Shopping cart.
//!
//! A cart is an ordered list of lines keyed by `(product_id, size, color)`.
//! The key is unique within a cart: adding an existing key increments its
//! quantity. Lines hold no prices; totals are always computed against the
//! current catalog so a stored cart never carries stale prices.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, Product};
use crate::types::{Money, ProductId};

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("product {0} is out of stock")]
    OutOfStock(ProductId),
    #[error("size {size} is not available for product {product_id}")]
    InvalidSize { product_id: ProductId, size: String },
    #[error("color {color} is not available for product {product_id}")]
    InvalidColor { product_id: ProductId, color: String },
    #[error("quantity must be at least 1")]
    ZeroQuantity,
}

/// Composite key of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
}

impl CartKey {
    #[must_use]
    pub fn new(product_id: ProductId, size: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            product_id,
            size: size.into(),
            color: color.into(),
        }
    }
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
    pub quantity: u32,
}

impl CartLine {
    fn has_key(&self, key: &CartKey) -> bool {
        self.product_id == key.product_id && self.size == key.size && self.color == key.color
    }

    /// This line's key.
    #[must_use]
    pub fn key(&self) -> CartKey {
        CartKey::new(self.product_id.clone(), &self.size, &self.color)
    }
}

/// A cart line joined to its product.
#[derive(Debug, Clone)]
pub struct ResolvedLine<'a> {
    pub line: &'a CartLine,
    pub product: &'a Product,
    pub line_total: Money,
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product variant.
    ///
    /// Increments the existing line when the key is already present,
    /// otherwise appends a new line. Quantities are capped at
    /// [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the product is out of stock, the size or color
    /// is not offered, or `quantity` is zero.
    pub fn add(
        &mut self,
        product: &Product,
        size: &str,
        color: &str,
        quantity: u32,
    ) -> Result<&CartLine, CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if !product.in_stock {
            return Err(CartError::OutOfStock(product.id.clone()));
        }
        if !product.has_size(size) {
            return Err(CartError::InvalidSize {
                product_id: product.id.clone(),
                size: size.to_string(),
            });
        }
        if !product.has_color(color) {
            return Err(CartError::InvalidColor {
                product_id: product.id.clone(),
                color: color.to_string(),
            });
        }

        let key = CartKey::new(product.id.clone(), size, color);
        let position = match self.lines.iter().position(|l| l.has_key(&key)) {
            Some(position) => {
                if let Some(line) = self.lines.get_mut(position) {
                    line.quantity = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY);
                }
                position
            }
            None => {
                self.lines.push(CartLine {
                    product_id: key.product_id,
                    size: key.size,
                    color: key.color,
                    quantity: quantity.min(MAX_LINE_QUANTITY),
                });
                self.lines.len() - 1
            }
        };

        // The position was either found or just pushed.
        #[allow(clippy::indexing_slicing)]
        Ok(&self.lines[position])
    }

    /// Remove a line. Returns whether anything was removed.
    pub fn remove(&mut self, key: &CartKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.has_key(key));
        self.lines.len() != before
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// Returns whether a line with this key exists (before removal).
    pub fn set_quantity(&mut self, key: &CartKey, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(key);
        }

        match self.lines.iter_mut().find(|l| l.has_key(key)) {
            Some(line) => {
                line.quantity = quantity.min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    /// Adjust a line's quantity by `delta`, never going below one.
    ///
    /// Returns the new quantity, or `None` if the line does not exist.
    pub fn adjust(&mut self, key: &CartKey, delta: i32) -> Option<u32> {
        let line = self.lines.iter_mut().find(|l| l.has_key(key))?;
        let adjusted = i64::from(line.quantity) + i64::from(delta);
        let clamped = adjusted.clamp(1, i64::from(MAX_LINE_QUANTITY));
        line.quantity = u32::try_from(clamped).unwrap_or(1);
        Some(line.quantity)
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Join lines to catalog products.
    ///
    /// Lines whose product is no longer in the catalog are skipped.
    #[must_use]
    pub fn resolve<'a>(&'a self, catalog: &'a Catalog) -> Vec<ResolvedLine<'a>> {
        self.lines
            .iter()
            .filter_map(|line| {
                catalog.get(&line.product_id).map(|product| ResolvedLine {
                    line,
                    product,
                    line_total: product.price * line.quantity,
                })
            })
            .collect()
    }

    /// Subtotal at current catalog prices.
    #[must_use]
    pub fn subtotal(&self, catalog: &Catalog) -> Money {
        self.resolve(catalog).iter().map(|r| r.line_total).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample_catalog;

    fn key(id: &str, size: &str, color: &str) -> CartKey {
        CartKey::new(ProductId::from(id), size, color)
    }

    #[test]
    fn test_add_same_variant_increments_quantity() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let mut cart = Cart::new();

        cart.add(dress, "S", "Blue", 1).unwrap();
        let line = cart.add(dress, "S", "Blue", 1).unwrap();

        assert_eq!(line.quantity, 2);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_add_different_variant_adds_row() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let mut cart = Cart::new();

        cart.add(dress, "S", "Blue", 1).unwrap();
        cart.add(dress, "S", "Pink", 1).unwrap();
        cart.add(dress, "M", "Blue", 2).unwrap();

        assert_eq!(cart.lines().len(), 3);
        assert_eq!(cart.total_items(), 4);
    }

    #[test]
    fn test_add_rejects_invalid_variants() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let sold_out = catalog.get(&ProductId::from("5")).unwrap();
        let mut cart = Cart::new();

        assert!(matches!(
            cart.add(dress, "XXL", "Blue", 1),
            Err(CartError::InvalidSize { .. })
        ));
        assert!(matches!(
            cart.add(dress, "S", "Green", 1),
            Err(CartError::InvalidColor { .. })
        ));
        assert!(matches!(
            cart.add(dress, "S", "Blue", 0),
            Err(CartError::ZeroQuantity)
        ));
        assert!(matches!(
            cart.add(sold_out, "S", "Black", 1),
            Err(CartError::OutOfStock(_))
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quantity_is_capped() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let mut cart = Cart::new();

        cart.add(dress, "S", "Blue", 98).unwrap();
        let line = cart.add(dress, "S", "Blue", 5).unwrap();
        assert_eq!(line.quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_remove() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let mut cart = Cart::new();
        cart.add(dress, "S", "Blue", 1).unwrap();
        cart.add(dress, "M", "Blue", 1).unwrap();

        assert!(cart.remove(&key("1", "S", "Blue")));
        assert!(!cart.remove(&key("1", "S", "Blue")));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].size, "M");
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let mut cart = Cart::new();
        cart.add(dress, "S", "Blue", 1).unwrap();

        assert!(cart.set_quantity(&key("1", "S", "Blue"), 4));
        assert_eq!(cart.total_items(), 4);

        assert!(cart.set_quantity(&key("1", "S", "Blue"), 0));
        assert!(cart.is_empty());

        assert!(!cart.set_quantity(&key("1", "S", "Blue"), 2));
    }

    #[test]
    fn test_adjust_never_goes_below_one() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let mut cart = Cart::new();
        cart.add(dress, "S", "Blue", 2).unwrap();

        let k = key("1", "S", "Blue");
        assert_eq!(cart.adjust(&k, -1), Some(1));
        assert_eq!(cart.adjust(&k, -1), Some(1));
        assert_eq!(cart.adjust(&k, 3), Some(4));
        assert_eq!(cart.adjust(&key("2", "S", "Blue"), 1), None);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_subtotal_uses_catalog_prices() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let jacket = catalog.get(&ProductId::from("2")).unwrap();
        let mut cart = Cart::new();
        cart.add(dress, "S", "Blue", 2).unwrap();
        cart.add(jacket, "M", "Dark Blue", 1).unwrap();

        assert_eq!(cart.subtotal(&catalog), Money::from_cents(2 * 5999 + 8999));

        let resolved = cart.resolve(&catalog);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].line_total, Money::from_cents(11998));
        assert_eq!(resolved[1].product.name, "Denim Jacket");
    }

    #[test]
    fn test_missing_products_are_skipped() {
        let catalog = sample_catalog();
        let cart: Cart = serde_json::from_str(
            r#"{"lines":[
                {"productId":"1","size":"S","color":"Blue","quantity":1},
                {"productId":"gone","size":"S","color":"Blue","quantity":3}
            ]}"#,
        )
        .unwrap();

        assert_eq!(cart.resolve(&catalog).len(), 1);
        assert_eq!(cart.subtotal(&catalog), Money::from_cents(5999));
    }

    #[test]
    fn test_clear() {
        let catalog = sample_catalog();
        let dress = catalog.get(&ProductId::from("1")).unwrap();
        let mut cart = Cart::new();
        cart.add(dress, "S", "Blue", 1).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
    }
}
