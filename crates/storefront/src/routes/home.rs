//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use super::products::ProductCardView;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    /// Products flagged as featured.
    pub featured: Vec<ProductCardView>,
    /// The whole catalog.
    pub products: Vec<ProductCardView>,
}

/// Display the home page.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, ctx: PageContext) -> impl IntoResponse {
    let catalog = state.catalog();

    HomeTemplate {
        ctx,
        featured: catalog
            .featured()
            .into_iter()
            .map(ProductCardView::from)
            .collect(),
        products: catalog.all().iter().map(ProductCardView::from).collect(),
    }
}
