//! Static content page route handlers.
//!
//! Serves the markdown pages loaded by [`ContentStore`](crate::content::ContentStore).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use tracing::instrument;

use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/content.html")]
pub struct ContentPageTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub description: String,
    pub updated_at: Option<NaiveDate>,
    pub content_html: String,
}

/// Serve a content page by slug, or the 404 page.
async fn serve_content_page(state: &AppState, ctx: PageContext, slug: &str) -> Response {
    let Some(page) = state.content().get_page(slug) else {
        tracing::warn!(slug, "Content page missing");
        return super::not_found(ctx).await.into_response();
    };

    ContentPageTemplate {
        ctx,
        title: page.meta.title.clone(),
        description: page.meta.description.clone().unwrap_or_default(),
        updated_at: page.meta.updated_at,
        content_html: page.content_html.clone(),
    }
    .into_response()
}

/// Display the About page.
#[instrument(skip(state, ctx))]
pub async fn about(State(state): State<AppState>, ctx: PageContext) -> Response {
    serve_content_page(&state, ctx, "about").await
}

/// Display the FAQ page.
#[instrument(skip(state, ctx))]
pub async fn faq(State(state): State<AppState>, ctx: PageContext) -> Response {
    serve_content_page(&state, ctx, "faq").await
}

/// Display the Shipping & Returns page.
#[instrument(skip(state, ctx))]
pub async fn shipping(State(state): State<AppState>, ctx: PageContext) -> Response {
    serve_content_page(&state, ctx, "shipping").await
}

/// Display the Size Guide.
#[instrument(skip(state, ctx))]
pub async fn size_guide(State(state): State<AppState>, ctx: PageContext) -> Response {
    serve_content_page(&state, ctx, "size-guide").await
}

/// Display the Privacy Policy page.
#[instrument(skip(state, ctx))]
pub async fn privacy(State(state): State<AppState>, ctx: PageContext) -> Response {
    serve_content_page(&state, ctx, "privacy").await
}
