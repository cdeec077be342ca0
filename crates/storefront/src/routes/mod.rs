//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check
//!
//! # Products
//! GET  /products               - Product listing (query: min, max, size, color, category)
//! GET  /products/{id}          - Product detail
//!
//! # Cart (HTMX fragments when HX-Request is set)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (count fragment + cart-updated trigger)
//! POST /cart/update            - Set quantity or adjust by delta
//! POST /cart/remove            - Remove line
//! POST /cart/coupon            - Apply coupon
//! POST /cart/coupon/remove     - Remove coupon
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Checkout
//! GET  /checkout               - Current wizard step
//! POST /checkout/shipping      - Step 1
//! POST /checkout/payment       - Step 2
//! POST /checkout/back          - Previous step
//! POST /checkout/place-order   - Step 3
//! GET  /checkout/complete      - Confirmation
//!
//! # Auth (POSTs rate limited)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/signup            - Signup page
//! POST /auth/signup            - Signup action
//! POST /auth/logout            - Logout action
//!
//! # Profile (requires auth)
//! GET  /profile                - Profile page
//! POST /profile                - Update details
//! POST /profile/password       - Change password (rate limited)
//! POST /profile/avatar         - Upload avatar (multipart)
//!
//! # Content
//! GET  /about, /faq, /shipping, /size-guide, /privacy
//! GET  /contact                - Contact form
//! POST /contact                - Submit (rate limited)
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod home;
pub mod pages;
pub mod products;
pub mod profile;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{MethodRouter, get, post},
};

use crate::filters;
use crate::middleware::PageContext;
use crate::middleware::rate_limit::RateLimiterLayer;
use crate::state::AppState;

/// Body limit for the avatar route: the image plus multipart overhead.
const AVATAR_BODY_LIMIT: usize = profile::MAX_AVATAR_BYTES + 64 * 1024;

// =============================================================================
// Error Pages
// =============================================================================

/// 404 page template.
#[derive(Template, WebTemplate)]
#[template(path = "error/404.html")]
pub struct NotFoundTemplate {
    pub ctx: PageContext,
}

/// Render the 404 page.
pub async fn not_found(ctx: PageContext) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate { ctx })
}

// =============================================================================
// Health
// =============================================================================

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Ready once the catalog has products to sell. The user service is not
/// probed: browsing and checkout work without it.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.catalog().is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

// =============================================================================
// Routers
// =============================================================================

/// Attach the shared limiter to a method router, when one could be built.
fn rate_limited(
    route: MethodRouter<AppState>,
    limiter: Option<&RateLimiterLayer>,
) -> MethodRouter<AppState> {
    match limiter {
        Some(limiter) => route.layer(limiter.clone()),
        None => route,
    }
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/shipping", post(checkout::submit_shipping))
        .route("/payment", post(checkout::submit_payment))
        .route("/back", post(checkout::back))
        .route("/place-order", post(checkout::place_order))
        .route("/complete", get(checkout::complete))
}

/// Create the auth routes router.
pub fn auth_routes(limiter: Option<&RateLimiterLayer>) -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(rate_limited(post(auth::login), limiter)),
        )
        .route(
            "/signup",
            get(auth::signup_page).merge(rate_limited(post(auth::signup), limiter)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the profile routes router.
pub fn profile_routes(limiter: Option<&RateLimiterLayer>) -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show).post(profile::update))
        .route(
            "/password",
            rate_limited(post(profile::change_password), limiter),
        )
        .route(
            "/avatar",
            post(profile::upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
}

/// Create the content page routes router.
pub fn page_routes(limiter: Option<&RateLimiterLayer>) -> Router<AppState> {
    Router::new()
        .route("/about", get(pages::about))
        .route("/faq", get(pages::faq))
        .route("/shipping", get(pages::shipping))
        .route("/size-guide", get(pages::size_guide))
        .route("/privacy", get(pages::privacy))
        .route(
            "/contact",
            get(contact::show).merge(rate_limited(post(contact::submit), limiter)),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let limiter = crate::middleware::auth_rate_limiter();
    if limiter.is_none() {
        tracing::warn!("Rate limiter could not be configured; auth endpoints are unlimited");
    }
    let limiter = limiter.as_ref();

    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes(limiter))
        .nest("/profile", profile_routes(limiter))
        .merge(page_routes(limiter))
        .fallback(not_found)
}

