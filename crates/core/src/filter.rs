//! Product listing filter.
//!
//! A product matches when its price lies in the inclusive range and, for each
//! of sizes, colors and categories, either nothing is selected or the product
//! offers at least one selected value.

use crate::catalog::{Catalog, Product};
use crate::types::Money;

/// Upper bound of the price slider.
pub const PRICE_CEILING: Money = Money::from_cents(30000);

/// Slider step; query bounds are given in whole dollars.
const CENTS_PER_DOLLAR: i64 = 100;

/// Filter state for the product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    pub price_min: Money,
    pub price_max: Money,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub categories: Vec<String>,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            price_min: Money::ZERO,
            price_max: PRICE_CEILING,
            sizes: Vec::new(),
            colors: Vec::new(),
            categories: Vec::new(),
        }
    }
}

impl ProductFilter {
    /// Build a filter from query-string pairs.
    ///
    /// Recognised keys: `min` and `max` (whole dollars), `size`, `color` and
    /// `category` (repeatable). Unknown keys and unparsable bounds are
    /// ignored. Bounds are clamped to the slider range and swapped when
    /// inverted.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }

            match key.as_ref() {
                "min" => {
                    if let Some(cents) = parse_dollars(value) {
                        filter.price_min = cents;
                    }
                }
                "max" => {
                    if let Some(cents) = parse_dollars(value) {
                        filter.price_max = cents;
                    }
                }
                "size" => push_unique(&mut filter.sizes, value),
                "color" => push_unique(&mut filter.colors, value),
                "category" => push_unique(&mut filter.categories, value),
                _ => {}
            }
        }

        filter.price_min = filter.price_min.clamp(Money::ZERO, PRICE_CEILING);
        filter.price_max = filter.price_max.clamp(Money::ZERO, PRICE_CEILING);
        if filter.price_min > filter.price_max {
            std::mem::swap(&mut filter.price_min, &mut filter.price_max);
        }

        filter
    }

    /// Whether a product passes the filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let in_price = product.price >= self.price_min && product.price <= self.price_max;
        let in_size = self.sizes.is_empty() || self.sizes.iter().any(|s| product.has_size(s));
        let in_color = self.colors.is_empty() || self.colors.iter().any(|c| product.has_color(c));
        let in_category =
            self.categories.is_empty() || self.categories.iter().any(|c| *c == product.category);

        in_price && in_size && in_color && in_category
    }

    /// Matching products in catalog order.
    #[must_use]
    pub fn apply<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Product> {
        catalog.all().iter().filter(|p| self.matches(p)).collect()
    }

    /// Whether the filter narrows anything compared to the default.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }

    /// Query-string pairs that reproduce this filter.
    ///
    /// Default bounds are omitted.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.price_min != Money::ZERO {
            pairs.push(("min", (self.price_min.cents() / CENTS_PER_DOLLAR).to_string()));
        }
        if self.price_max != PRICE_CEILING {
            pairs.push(("max", (self.price_max.cents() / CENTS_PER_DOLLAR).to_string()));
        }
        pairs.extend(self.sizes.iter().map(|s| ("size", s.clone())));
        pairs.extend(self.colors.iter().map(|c| ("color", c.clone())));
        pairs.extend(self.categories.iter().map(|c| ("category", c.clone())));
        pairs
    }
}

fn parse_dollars(value: &str) -> Option<Money> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|dollars| dollars.checked_mul(CENTS_PER_DOLLAR))
        .map(Money::from_cents)
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample_catalog;

    fn ids(products: &[&Product]) -> Vec<String> {
        products.iter().map(|p| p.id.to_string()).collect()
    }

    #[test]
    fn test_default_matches_everything_in_range() {
        let catalog = sample_catalog();
        let filter = ProductFilter::default();
        assert!(!filter.is_active());
        assert_eq!(filter.apply(&catalog).len(), catalog.len());
    }

    #[test]
    fn test_price_range_is_inclusive() {
        let catalog = sample_catalog();
        let filter = ProductFilter::from_pairs([("min", "30"), ("max", "89")]);
        assert_eq!(filter.price_min, Money::from_cents(3000));
        assert_eq!(filter.price_max, Money::from_cents(8900));
        // 5999 and 3000 are in; 8999 is above 8900.
        assert_eq!(ids(&filter.apply(&catalog)), vec!["1", "3"]);
    }

    #[test]
    fn test_sizes_match_any_selected() {
        let catalog = sample_catalog();
        let filter = ProductFilter::from_pairs([("size", "XS"), ("size", "XL")]);
        assert_eq!(ids(&filter.apply(&catalog)), vec!["1", "2"]);
    }

    #[test]
    fn test_facets_combine_with_and() {
        let catalog = sample_catalog();
        let filter = ProductFilter::from_pairs([("size", "S"), ("color", "Pink")]);
        assert_eq!(ids(&filter.apply(&catalog)), vec!["1"]);

        let filter = ProductFilter::from_pairs([("category", "Tops"), ("max", "100")]);
        assert_eq!(ids(&filter.apply(&catalog)), vec!["3", "5"]);
    }

    #[test]
    fn test_bounds_are_clamped_and_swapped() {
        let filter = ProductFilter::from_pairs([("min", "500"), ("max", "-20")]);
        assert_eq!(filter.price_min, Money::ZERO);
        assert_eq!(filter.price_max, PRICE_CEILING);

        let filter = ProductFilter::from_pairs([("min", "80"), ("max", "20")]);
        assert_eq!(filter.price_min, Money::from_cents(2000));
        assert_eq!(filter.price_max, Money::from_cents(8000));
    }

    #[test]
    fn test_ignores_junk_and_duplicates() {
        let filter = ProductFilter::from_pairs([
            ("min", "abc"),
            ("size", "M"),
            ("size", "M"),
            ("color", ""),
            ("page", "2"),
        ]);
        assert_eq!(filter.price_min, Money::ZERO);
        assert_eq!(filter.sizes, vec!["M"]);
        assert!(filter.colors.is_empty());
        assert!(filter.is_active());
    }

    #[test]
    fn test_to_pairs_reproduces_filter() {
        let filter = ProductFilter::from_pairs([
            ("min", "10"),
            ("size", "S"),
            ("category", "Tops"),
        ]);
        let pairs = filter.to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("min", "10".to_string()),
                ("size", "S".to_string()),
                ("category", "Tops".to_string()),
            ]
        );
        assert_eq!(ProductFilter::from_pairs(pairs), filter);
    }
}
