//! Cart route handlers.
//!
//! The cart lives in the session and holds no prices; every page prices it
//! against the catalog. Mutations redirect back to the cart page and send an
//! `HX-Trigger: cart-updated` header so HTMX pages refresh the header badge.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{
    Cart, CartError, CartKey, Coupon, CouponError, OrderTotals, ProductId,
    cart::MAX_LINE_QUANTITY,
};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::PageContext;
use crate::models::session_keys;
use crate::state::AppState;

/// HTMX event fired after any cart change.
const CART_UPDATED_TRIGGER: (&str, &str) = ("HX-Trigger", "cart-updated");

// =============================================================================
// Views
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: String,
    pub name: String,
    pub image: String,
    pub size: String,
    pub color: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
    pub at_max: bool,
}

/// Order totals display data for templates.
#[derive(Clone)]
pub struct TotalsView {
    pub subtotal: String,
    pub discount: Option<String>,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    /// How much more to spend for free shipping, when not yet free.
    pub free_shipping_gap: Option<String>,
}

impl From<&OrderTotals> for TotalsView {
    fn from(totals: &OrderTotals) -> Self {
        Self {
            subtotal: totals.subtotal.to_string(),
            discount: (!totals.discount.is_zero()).then(|| format!("-{}", totals.discount)),
            shipping: if totals.free_shipping() {
                "Free".to_string()
            } else {
                totals.shipping.to_string()
            },
            tax: totals.tax.to_string(),
            total: totals.total.to_string(),
            free_shipping_gap: (!totals.free_shipping())
                .then(|| totals.amount_to_free_shipping().to_string()),
        }
    }
}

/// Build line views for the current cart.
pub(crate) fn line_views(cart: &Cart, state: &AppState) -> Vec<CartLineView> {
    cart.resolve(state.catalog())
        .into_iter()
        .map(|r| CartLineView {
            product_id: r.product.id.to_string(),
            name: r.product.name.clone(),
            image: r.product.primary_image().to_string(),
            size: r.line.size.clone(),
            color: r.line.color.clone(),
            quantity: r.line.quantity,
            unit_price: r.product.price.to_string(),
            line_total: r.line_total.to_string(),
            at_max: r.line.quantity >= MAX_LINE_QUANTITY,
        })
        .collect()
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart from the session, or an empty one.
pub(crate) async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Store the cart in the session.
pub(crate) async fn save_cart(
    session: &Session,
    cart: &Cart,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

/// Get the applied coupon from the session.
pub(crate) async fn load_coupon(session: &Session) -> Option<Coupon> {
    session
        .get::<Coupon>(session_keys::COUPON)
        .await
        .ok()
        .flatten()
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub size: String,
    pub color: String,
    pub quantity: Option<u32>,
}

/// Update cart form data.
///
/// `delta` comes from the +/- buttons and never removes the line;
/// `quantity` comes from the number input and removes it at zero.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub size: String,
    pub color: String,
    pub quantity: Option<u32>,
    pub delta: Option<i32>,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
    pub size: String,
    pub color: String,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    #[serde(default)]
    pub code: String,
}

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

fn error_message(code: &str) -> &'static str {
    match code {
        "coupon_empty" => "Enter a coupon code.",
        "coupon_invalid" => "Invalid coupon code",
        "empty_cart" => "Your cart is empty.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "coupon_applied" => Some("Coupon applied: 10% off your subtotal."),
        "coupon_removed" => Some("Coupon removed."),
        _ => None,
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub totals: TotalsView,
    pub coupon: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
#[instrument(skip(state, session, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    let coupon = load_coupon(&session).await;
    let totals = OrderTotals::compute(cart.subtotal(state.catalog()), coupon);

    CartShowTemplate {
        ctx,
        lines: line_views(&cart, &state),
        item_count: cart.total_items(),
        totals: TotalsView::from(&totals),
        coupon: coupon.map(|c| c.code().to_string()),
        error: query.error.as_deref().map(|c| error_message(c).to_string()),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(str::to_string),
    }
}

/// Add a product variant to the cart.
///
/// HTMX requests get the updated count badge; plain form posts are
/// redirected to the cart, or back to the product page on error.
///
/// # Errors
///
/// Returns 404 for an unknown product and 500 if the session cannot be
/// written.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product_id = ProductId::new(form.product_id);
    let product = state
        .catalog()
        .get(&product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    let mut cart = load_cart(&session).await;
    if let Err(e) = cart.add(product, &form.size, &form.color, form.quantity.unwrap_or(1)) {
        tracing::info!("Rejected add to cart: {e}");
        if is_htmx(&headers) {
            return Ok((StatusCode::BAD_REQUEST, Html(e.to_string())).into_response());
        }
        let code = match e {
            CartError::OutOfStock(_) => "out_of_stock",
            CartError::InvalidSize { .. } => "size",
            CartError::InvalidColor { .. } => "color",
            CartError::ZeroQuantity => "quantity",
        };
        return Ok(Redirect::to(&format!("/products/{product_id}?error={code}")).into_response());
    }
    save_cart(&session, &cart).await?;

    tracing::info!(
        product_id = %product_id,
        items = cart.total_items(),
        "Added to cart"
    );

    if is_htmx(&headers) {
        return Ok((
            AppendHeaders([CART_UPDATED_TRIGGER]),
            CartCountTemplate {
                count: cart.total_items(),
            },
        )
            .into_response());
    }

    Ok((AppendHeaders([CART_UPDATED_TRIGGER]), Redirect::to("/cart")).into_response())
}

/// Change a line's quantity.
///
/// # Errors
///
/// Returns 400 when neither `delta` nor `quantity` is given and 500 if the
/// session cannot be written.
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Result<Response> {
    let key = CartKey::new(ProductId::new(form.product_id), form.size, form.color);
    let mut cart = load_cart(&session).await;

    let found = match (form.delta, form.quantity) {
        (Some(delta), _) => cart.adjust(&key, delta).is_some(),
        (None, Some(quantity)) => cart.set_quantity(&key, quantity),
        (None, None) => {
            return Err(AppError::BadRequest(
                "quantity or delta is required".to_string(),
            ));
        }
    };

    if found {
        save_cart(&session, &cart).await?;
    } else {
        tracing::debug!(?key, "Update for a line not in the cart");
    }

    Ok((AppendHeaders([CART_UPDATED_TRIGGER]), Redirect::to("/cart")).into_response())
}

/// Remove a line from the cart.
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Result<Response> {
    let key = CartKey::new(ProductId::new(form.product_id), form.size, form.color);
    let mut cart = load_cart(&session).await;

    if cart.remove(&key) {
        save_cart(&session, &cart).await?;
    }

    Ok((AppendHeaders([CART_UPDATED_TRIGGER]), Redirect::to("/cart")).into_response())
}

/// Apply a coupon code.
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(session))]
pub async fn apply_coupon(session: Session, Form(form): Form<CouponForm>) -> Result<Redirect> {
    match Coupon::parse(&form.code) {
        Ok(coupon) => {
            session.insert(session_keys::COUPON, coupon).await?;
            Ok(Redirect::to("/cart?success=coupon_applied"))
        }
        Err(CouponError::Empty) => Ok(Redirect::to("/cart?error=coupon_empty")),
        Err(CouponError::Unknown(code)) => {
            tracing::info!(code = %code, "Unknown coupon code");
            session.remove::<Coupon>(session_keys::COUPON).await?;
            Ok(Redirect::to("/cart?error=coupon_invalid"))
        }
    }
}

/// Remove the applied coupon.
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(session))]
pub async fn remove_coupon(session: Session) -> Result<Redirect> {
    session.remove::<Coupon>(session_keys::COUPON).await?;
    Ok(Redirect::to("/cart?success=coupon_removed"))
}

/// Get the cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.total_items(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::Money;

    #[test]
    fn test_totals_view_below_free_shipping() {
        let totals = OrderTotals::compute(Money::from_cents(5999), None);
        let view = TotalsView::from(&totals);
        assert_eq!(view.subtotal, "$59.99");
        assert_eq!(view.shipping, "$5.99");
        assert_eq!(view.tax, "$4.80");
        assert_eq!(view.total, "$70.78");
        assert_eq!(view.free_shipping_gap.as_deref(), Some("$15.01"));
        assert!(view.discount.is_none());
    }

    #[test]
    fn test_totals_view_with_coupon_and_free_shipping() {
        let totals = OrderTotals::compute(Money::from_cents(8999), Some(Coupon::Save10));
        let view = TotalsView::from(&totals);
        assert_eq!(view.shipping, "Free");
        assert_eq!(view.discount.as_deref(), Some("-$9.00"));
        assert!(view.free_shipping_gap.is_none());
    }

    #[test]
    fn test_messages() {
        assert_eq!(error_message("coupon_invalid"), "Invalid coupon code");
        assert_eq!(success_message("coupon_applied"), Some("Coupon applied: 10% off your subtotal."));
        assert_eq!(success_message("nope"), None);
    }
}
