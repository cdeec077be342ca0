//! Products and the read-only catalog.
//!
//! The catalog is loaded once from a JSON fixture at startup and never
//! mutated afterwards. Lookups are by [`ProductId`]; listing order is the
//! fixture order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Money, ProductId};

/// Image shown when a product has no images of its own.
pub const PLACEHOLDER_IMAGE: &str = "/static/images/placeholder.svg";

/// Number of products shown on the home page when none are flagged as featured.
const FEATURED_FALLBACK_COUNT: usize = 4;

/// Errors raised while building a [`Catalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Fixture is not valid JSON or does not match the product shape.
    #[error("invalid catalog fixture: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two products share an id.
    #[error("duplicate product id: {0}")]
    DuplicateId(ProductId),

    /// A product has an empty id.
    #[error("product with empty id: {0}")]
    EmptyId(String),

    /// A product has a negative price.
    #[error("product {0} has a negative price")]
    NegativePrice(ProductId),
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price in cents.
    pub price: Money,
    /// Image URLs, first one is the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub in_stock: bool,
    #[serde(default)]
    pub featured: bool,
}

impl Product {
    /// The first image, or the placeholder when the product has none.
    #[must_use]
    pub fn primary_image(&self) -> &str {
        self.images.first().map_or(PLACEHOLDER_IMAGE, String::as_str)
    }

    /// Whether the product is offered in the given size.
    #[must_use]
    pub fn has_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size)
    }

    /// Whether the product is offered in the given color.
    #[must_use]
    pub fn has_color(&self, color: &str) -> bool {
        self.colors.iter().any(|c| c == color)
    }
}

/// The read-only product catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Build a catalog, checking ids and prices.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on duplicate or empty ids and negative prices.
    pub fn from_products(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(products.len());

        for (position, product) in products.iter().enumerate() {
            if product.id.as_str().trim().is_empty() {
                return Err(CatalogError::EmptyId(product.name.clone()));
            }
            if product.price.is_negative() {
                return Err(CatalogError::NegativePrice(product.id.clone()));
            }
            if index.insert(product.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(product.id.clone()));
            }
        }

        Ok(Self { products, index })
    }

    /// Parse a JSON array of products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON, or any error from
    /// [`Catalog::from_products`].
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let products: Vec<Product> = serde_json::from_str(json)?;
        Self::from_products(products)
    }

    /// All products in fixture order.
    #[must_use]
    pub fn all(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.index.get(id).and_then(|&i| self.products.get(i))
    }

    /// Products flagged as featured.
    ///
    /// Falls back to the first few products so the home page is never empty.
    #[must_use]
    pub fn featured(&self) -> Vec<&Product> {
        let featured: Vec<&Product> = self.products.iter().filter(|p| p.featured).collect();
        if featured.is_empty() {
            self.products.iter().take(FEATURED_FALLBACK_COUNT).collect()
        } else {
            featured
        }
    }

    /// Other products in the same category, in catalog order.
    #[must_use]
    pub fn related(&self, id: &ProductId, limit: usize) -> Vec<&Product> {
        let Some(product) = self.get(id) else {
            return Vec::new();
        };

        self.products
            .iter()
            .filter(|p| p.id != product.id && p.category == product.category)
            .take(limit)
            .collect()
    }

    /// Every size offered by any product, in first-appearance order.
    #[must_use]
    pub fn sizes(&self) -> Vec<String> {
        unique_in_order(self.products.iter().flat_map(|p| p.sizes.iter()))
    }

    /// Every color offered by any product, in first-appearance order.
    #[must_use]
    pub fn colors(&self) -> Vec<String> {
        unique_in_order(self.products.iter().flat_map(|p| p.colors.iter()))
    }

    /// Every category, in first-appearance order.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        unique_in_order(self.products.iter().map(|p| &p.category))
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

fn unique_in_order<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for value in values {
        if seen.insert(value.as_str()) {
            unique.push(value.clone());
        }
    }
    unique
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Build a product for tests.
    pub(crate) fn product(id: &str, category: &str, price: i64) -> Product {
        Product {
            id: ProductId::from(id),
            name: format!("Product {id}"),
            description: "Stylish fashion item".to_string(),
            price: Money::from_cents(price),
            images: vec![format!("/static/images/{id}.jpg")],
            category: category.to_string(),
            sizes: vec!["S".to_string(), "M".to_string(), "L".to_string()],
            colors: vec!["Black".to_string(), "White".to_string()],
            in_stock: true,
            featured: false,
        }
    }

    pub(crate) fn sample_catalog() -> Catalog {
        let mut dress = product("1", "Dresses", 5999);
        dress.name = "Summer Floral Dress".to_string();
        dress.sizes = vec!["XS".into(), "S".into(), "M".into(), "L".into()];
        dress.colors = vec!["Blue".into(), "Pink".into()];
        dress.featured = true;

        let mut jacket = product("2", "Outerwear", 8999);
        jacket.name = "Denim Jacket".to_string();
        jacket.sizes = vec!["S".into(), "M".into(), "L".into(), "XL".into()];
        jacket.colors = vec!["Light Blue".into(), "Dark Blue".into()];

        let mut sold_out = product("5", "Tops", 2500);
        sold_out.in_stock = false;

        Catalog::from_products(vec![
            dress,
            jacket,
            product("3", "Tops", 3000),
            product("4", "Tops", 12000),
            sold_out,
        ])
        .unwrap()
    }

    #[test]
    fn test_from_json_camel_case_fixture() {
        let json = r#"[{
            "id": "1",
            "name": "Summer Floral Dress",
            "description": "Light and breezy cotton dress with floral print",
            "price": 5999,
            "images": ["/dress1.jpg", "/dress1b.jpg"],
            "category": "Dresses",
            "sizes": ["XS", "S"],
            "colors": ["Blue"],
            "inStock": true,
            "featured": true
        }, {
            "id": "2",
            "name": "Denim Jacket",
            "description": "Classic distressed denim jacket",
            "price": 8999,
            "category": "Outerwear",
            "inStock": false
        }]"#;

        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);

        let dress = catalog.get(&ProductId::from("1")).unwrap();
        assert_eq!(dress.price, Money::from_cents(5999));
        assert_eq!(dress.primary_image(), "/dress1.jpg");
        assert!(dress.featured);

        let jacket = catalog.get(&ProductId::from("2")).unwrap();
        assert!(!jacket.featured);
        assert!(!jacket.in_stock);
        assert_eq!(jacket.primary_image(), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = Catalog::from_products(vec![product("1", "Tops", 100), product("1", "Tops", 200)]);
        assert!(matches!(result, Err(CatalogError::DuplicateId(_))));
    }

    #[test]
    fn test_rejects_empty_id_and_negative_price() {
        let result = Catalog::from_products(vec![product(" ", "Tops", 100)]);
        assert!(matches!(result, Err(CatalogError::EmptyId(_))));

        let result = Catalog::from_products(vec![product("1", "Tops", -1)]);
        assert!(matches!(result, Err(CatalogError::NegativePrice(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            Catalog::from_json("{\"id\": 1}"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_featured_uses_flag() {
        let catalog = sample_catalog();
        let featured: Vec<&str> = catalog.featured().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(featured, vec!["1"]);
    }

    #[test]
    fn test_featured_falls_back_to_first_products() {
        let catalog = Catalog::from_products(
            (1..=6).map(|i| product(&i.to_string(), "Tops", 1000)).collect(),
        )
        .unwrap();
        let featured: Vec<&str> = catalog.featured().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(featured, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_related_same_category_excluding_self() {
        let catalog = sample_catalog();
        let related: Vec<&str> = catalog
            .related(&ProductId::from("3"), 4)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(related, vec!["4", "5"]);

        assert_eq!(catalog.related(&ProductId::from("3"), 1).len(), 1);
        assert!(catalog.related(&ProductId::from("missing"), 4).is_empty());
    }

    #[test]
    fn test_unique_facets_in_first_appearance_order() {
        let catalog = sample_catalog();
        assert_eq!(catalog.sizes(), vec!["XS", "S", "M", "L", "XL"]);
        assert_eq!(
            catalog.colors(),
            vec!["Blue", "Pink", "Light Blue", "Dark Blue", "Black", "White"]
        );
        assert_eq!(catalog.categories(), vec!["Dresses", "Outerwear", "Tops"]);
    }
}
