//! Checkout wizard route handlers.
//!
//! The wizard state is kept in the session under `checkout`. Each step posts
//! to its own endpoint and redirects back to `GET /checkout`, which renders
//! whichever step the wizard is on. Invalid input re-renders the step with
//! field errors. Placing the order clears the cart, the coupon and the
//! wizard, and keeps the confirmation for `/checkout/complete`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{
    Cart, Checkout, CheckoutError, CheckoutStep, Coupon, OrderConfirmation, OrderTotals,
    PaymentDetails, ShippingDetails, ValidationErrors, checkout::COUNTRIES,
};

use super::cart::{CartLineView, TotalsView, line_views, load_cart, load_coupon};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::PageContext;
use crate::models::session_keys;
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// A step in the progress indicator.
#[derive(Clone)]
pub struct StepView {
    pub number: u8,
    pub title: &'static str,
    pub reached: bool,
}

fn step_views(current: CheckoutStep) -> Vec<StepView> {
    [
        CheckoutStep::Shipping,
        CheckoutStep::Payment,
        CheckoutStep::Review,
    ]
    .into_iter()
    .map(|step| StepView {
        number: step.number(),
        title: step.title(),
        reached: step <= current,
    })
    .collect()
}

/// A country in the shipping form's select.
#[derive(Clone)]
pub struct CountryOption {
    pub code: &'static str,
    pub name: &'static str,
    pub selected: bool,
}

fn country_options(selected: &str) -> Vec<CountryOption> {
    COUNTRIES
        .iter()
        .map(|&(code, name)| CountryOption {
            code,
            name,
            selected: code == selected,
        })
        .collect()
}

/// Order item display data for the confirmation page.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub image: String,
    pub size: String,
    pub color: String,
    pub quantity: u32,
    pub line_total: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page template (all three steps).
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub step: u8,
    pub title: &'static str,
    pub steps: Vec<StepView>,
    pub shipping: ShippingDetails,
    pub countries: Vec<CountryOption>,
    pub country_name: String,
    pub card_name: String,
    pub billing_same: bool,
    pub card_masked: String,
    pub errors: ValidationErrors,
    pub lines: Vec<CartLineView>,
    pub totals: TotalsView,
    pub coupon: Option<String>,
}

/// Checkout page shown when the cart is empty.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/empty.html")]
pub struct CheckoutEmptyTemplate {
    pub ctx: PageContext,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/complete.html")]
pub struct CheckoutCompleteTemplate {
    pub ctx: PageContext,
    pub number: String,
    pub placed_at: String,
    pub items: Vec<OrderItemView>,
    pub totals: TotalsView,
    pub coupon: Option<String>,
    pub shipping: ShippingDetails,
    pub country_name: String,
    pub card_masked: String,
}

impl CheckoutCompleteTemplate {
    fn new(ctx: PageContext, order: &OrderConfirmation) -> Self {
        Self {
            ctx,
            number: order.number.to_string(),
            placed_at: order.placed_at.format("%B %-d, %Y at %H:%M UTC").to_string(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    name: item.name.clone(),
                    image: item.image.clone(),
                    size: item.size.clone(),
                    color: item.color.clone(),
                    quantity: item.quantity,
                    line_total: item.line_total.to_string(),
                })
                .collect(),
            totals: TotalsView::from(&order.totals),
            coupon: order.coupon.map(|c| c.code().to_string()),
            country_name: order.shipping.country_name().to_string(),
            shipping: order.shipping.clone(),
            card_masked: order.payment.masked(),
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn load_checkout(session: &Session) -> Checkout {
    session
        .get::<Checkout>(session_keys::CHECKOUT)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

async fn save_checkout(
    session: &Session,
    checkout: &Checkout,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CHECKOUT, checkout).await
}

/// Form values to show for the current step.
struct StepInput {
    shipping: ShippingDetails,
    card_name: String,
    billing_same: bool,
    errors: ValidationErrors,
}

impl StepInput {
    /// Values from what the wizard already holds, falling back to a
    /// remembered address.
    async fn from_session(session: &Session, checkout: &Checkout) -> Self {
        let shipping = match checkout.shipping() {
            Some(shipping) => shipping.clone(),
            None => session
                .get::<ShippingDetails>(session_keys::SAVED_ADDRESS)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| ShippingDetails {
                    country: "US".to_string(),
                    ..ShippingDetails::default()
                }),
        };
        let (card_name, billing_same) = checkout
            .payment()
            .map_or_else(|| (String::new(), true), |p| (p.card_name.clone(), p.billing_same));

        Self {
            shipping,
            card_name,
            billing_same,
            errors: ValidationErrors::new(),
        }
    }
}

async fn render_step(
    state: &AppState,
    session: &Session,
    ctx: PageContext,
    cart: &Cart,
    checkout: &Checkout,
    input: StepInput,
) -> CheckoutTemplate {
    let coupon = load_coupon(session).await;
    let totals = OrderTotals::compute(cart.subtotal(state.catalog()), coupon);
    let step = checkout.step();

    CheckoutTemplate {
        ctx,
        step: step.number(),
        title: step.title(),
        steps: step_views(step),
        countries: country_options(&input.shipping.country),
        country_name: input.shipping.country_name().to_string(),
        shipping: input.shipping,
        card_name: input.card_name,
        billing_same: input.billing_same,
        card_masked: checkout.payment().map(|p| p.masked()).unwrap_or_default(),
        errors: input.errors,
        lines: line_views(cart, state),
        totals: TotalsView::from(&totals),
        coupon: coupon.map(|c| c.code().to_string()),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the current checkout step.
#[instrument(skip(state, session, ctx))]
pub async fn show(State(state): State<AppState>, session: Session, ctx: PageContext) -> Response {
    let cart = load_cart(&session).await;
    if cart.resolve(state.catalog()).is_empty() {
        return CheckoutEmptyTemplate { ctx }.into_response();
    }

    let checkout = load_checkout(&session).await;
    let input = StepInput::from_session(&session, &checkout).await;
    render_step(&state, &session, ctx, &cart, &checkout, input)
        .await
        .into_response()
}

/// Submit step 1 (shipping address).
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(state, session, ctx, form))]
pub async fn submit_shipping(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<ShippingDetails>,
) -> Result<Response> {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/checkout").into_response());
    }

    let mut checkout = load_checkout(&session).await;
    match checkout.submit_shipping(form.clone()) {
        Ok(()) => {
            if let Some(shipping) = checkout.shipping().filter(|s| s.save_address) {
                session.insert(session_keys::SAVED_ADDRESS, shipping).await?;
            }
            save_checkout(&session, &checkout).await?;
            tracing::info!("Checkout shipping step completed");
            Ok(Redirect::to("/checkout").into_response())
        }
        Err(CheckoutError::Invalid(errors)) => {
            let mut input = StepInput::from_session(&session, &checkout).await;
            input.shipping = form;
            input.errors = errors;
            let page = render_step(&state, &session, ctx, &cart, &checkout, input).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => {
            tracing::debug!("Shipping submitted out of order: {e}");
            Ok(Redirect::to("/checkout").into_response())
        }
    }
}

/// Submit step 2 (card details).
///
/// Only the cardholder name and last four digits are kept.
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(state, session, ctx, form))]
pub async fn submit_payment(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<PaymentDetails>,
) -> Result<Response> {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/checkout").into_response());
    }

    let mut checkout = load_checkout(&session).await;
    match checkout.submit_payment(&form) {
        Ok(()) => {
            save_checkout(&session, &checkout).await?;
            tracing::info!("Checkout payment step completed");
            Ok(Redirect::to("/checkout").into_response())
        }
        Err(CheckoutError::Invalid(errors)) => {
            let mut input = StepInput::from_session(&session, &checkout).await;
            input.card_name = form.card_name;
            input.billing_same = form.billing_same;
            input.errors = errors;
            let page = render_step(&state, &session, ctx, &cart, &checkout, input).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => {
            tracing::debug!("Payment submitted out of order: {e}");
            Ok(Redirect::to("/checkout").into_response())
        }
    }
}

/// Go back one step, keeping what was entered.
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(session))]
pub async fn back(session: Session) -> Result<Redirect> {
    let mut checkout = load_checkout(&session).await;
    let step = checkout.back();
    save_checkout(&session, &checkout).await?;
    tracing::debug!(step = %step, "Checkout went back");
    Ok(Redirect::to("/checkout"))
}

/// Place the order from the review step.
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(state, session))]
pub async fn place_order(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let cart = load_cart(&session).await;
    let coupon = load_coupon(&session).await;
    let checkout = load_checkout(&session).await;

    match checkout.place_order(&cart, state.catalog(), coupon) {
        Ok(order) => {
            tracing::info!(
                order_number = %order.number,
                items = order.items.len(),
                total_cents = order.totals.total.cents(),
                "Order placed"
            );
            add_breadcrumb(
                "checkout",
                "Order placed",
                Some(&[("order", order.number.as_str())][..]),
            );

            session.remove::<Cart>(session_keys::CART).await?;
            session.remove::<Checkout>(session_keys::CHECKOUT).await?;
            session.remove::<Coupon>(session_keys::COUPON).await?;
            session.insert(session_keys::LAST_ORDER, &order).await?;
            Ok(Redirect::to("/checkout/complete"))
        }
        Err(CheckoutError::EmptyCart) => {
            session.remove::<Checkout>(session_keys::CHECKOUT).await?;
            Ok(Redirect::to("/cart?error=empty_cart"))
        }
        Err(e) => {
            tracing::debug!("Order placed out of order: {e}");
            Ok(Redirect::to("/checkout"))
        }
    }
}

/// Display the confirmation for the most recent order.
#[instrument(skip(session, ctx))]
pub async fn complete(session: Session, ctx: PageContext) -> Response {
    match session
        .get::<OrderConfirmation>(session_keys::LAST_ORDER)
        .await
        .ok()
        .flatten()
    {
        Some(order) => CheckoutCompleteTemplate::new(ctx, &order).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_views_mark_reached_steps() {
        let steps = step_views(CheckoutStep::Payment);
        let reached: Vec<bool> = steps.iter().map(|s| s.reached).collect();
        assert_eq!(reached, vec![true, true, false]);
        assert_eq!(steps.last().map(|s| s.title), Some("Review Your Order"));
    }

    #[test]
    fn test_country_options_select_one() {
        let options = country_options("CA");
        let selected: Vec<_> = options.iter().filter(|o| o.selected).map(|o| o.code).collect();
        assert_eq!(selected, vec!["CA"]);
        assert_eq!(options.len(), COUNTRIES.len());
    }
}
