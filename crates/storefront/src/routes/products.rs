//! Product route handlers.
//!
//! The listing reads its filter from the query string (`min`, `max`, `size`,
//! `color`, `category`; the last three repeatable), so a filtered listing is
//! a plain GET form and every filter state has a shareable URL.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, RawQuery, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use atelier_core::{Money, Product, ProductFilter, ProductId, filter::PRICE_CEILING};

use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Related products shown under a product.
const RELATED_LIMIT: usize = 4;

// =============================================================================
// Views
// =============================================================================

/// Product card display data for templates.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub image: String,
    pub category: String,
    pub in_stock: bool,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.to_string(),
            image: product.primary_image().to_string(),
            category: product.category.clone(),
            in_stock: product.in_stock,
        }
    }
}

/// Product detail display data for templates.
#[derive(Clone)]
pub struct ProductDetailView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image: String,
    pub thumbnails: Vec<String>,
    pub category: String,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub in_stock: bool,
}

impl From<&Product> for ProductDetailView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            image: product.primary_image().to_string(),
            thumbnails: if product.images.len() > 1 {
                product.images.clone()
            } else {
                Vec::new()
            },
            category: product.category.clone(),
            sizes: product.sizes.clone(),
            colors: product.colors.clone(),
            in_stock: product.in_stock,
        }
    }
}

/// A checkbox in the filter sidebar.
#[derive(Clone)]
pub struct FilterOption {
    pub value: String,
    pub checked: bool,
}

impl FilterOption {
    fn list(values: Vec<String>, selected: &[String]) -> Vec<Self> {
        values
            .into_iter()
            .map(|value| Self {
                checked: selected.contains(&value),
                value,
            })
            .collect()
    }
}

/// Filter sidebar state for templates.
#[derive(Clone)]
pub struct FilterView {
    pub min: i64,
    pub max: i64,
    pub ceiling: i64,
    pub min_label: String,
    pub max_label: String,
    pub sizes: Vec<FilterOption>,
    pub colors: Vec<FilterOption>,
    pub categories: Vec<FilterOption>,
    pub active: bool,
}

impl FilterView {
    fn new(filter: &ProductFilter, state: &AppState) -> Self {
        let catalog = state.catalog();
        Self {
            min: dollars(filter.price_min),
            max: dollars(filter.price_max),
            ceiling: dollars(PRICE_CEILING),
            min_label: filter.price_min.whole_dollars(),
            max_label: filter.price_max.whole_dollars(),
            sizes: FilterOption::list(catalog.sizes(), &filter.sizes),
            colors: FilterOption::list(catalog.colors(), &filter.colors),
            categories: FilterOption::list(catalog.categories(), &filter.categories),
            active: filter.is_active(),
        }
    }
}

const fn dollars(amount: Money) -> i64 {
    amount.cents() / 100
}

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductCardView>,
    pub filter: FilterView,
    pub total: usize,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: ProductDetailView,
    pub related: Vec<ProductCardView>,
    pub error: Option<String>,
}

/// Query parameters for the detail page.
#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub error: Option<String>,
}

/// Messages for add-to-cart failures redirected back to the product page.
fn add_error_message(code: &str) -> &'static str {
    match code {
        "out_of_stock" => "This product is out of stock.",
        "size" => "Please choose one of the available sizes.",
        "color" => "Please choose one of the available colors.",
        "quantity" => "Quantity must be at least 1.",
        _ => "Could not add this item to your cart.",
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the product listing with the filter sidebar.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let filter = ProductFilter::from_pairs(url::form_urlencoded::parse(
        query.as_deref().unwrap_or_default().as_bytes(),
    ));

    let products: Vec<ProductCardView> = filter
        .apply(state.catalog())
        .into_iter()
        .map(ProductCardView::from)
        .collect();

    ProductsIndexTemplate {
        ctx,
        total: state.catalog().len(),
        filter: FilterView::new(&filter, &state),
        products,
    }
}

/// Display a product with related products from its category.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<String>,
    Query(query): Query<ShowQuery>,
) -> Response {
    let id = ProductId::new(id);
    let Some(product) = state.catalog().get(&id) else {
        tracing::debug!(product_id = %id, "Unknown product");
        return super::not_found(ctx).await.into_response();
    };

    ProductShowTemplate {
        ctx,
        product: ProductDetailView::from(product),
        related: state
            .catalog()
            .related(&id, RELATED_LIMIT)
            .into_iter()
            .map(ProductCardView::from)
            .collect(),
        error: query.error.as_deref().map(|c| add_error_message(c).to_string()),
    }
    .into_response()
}
