//! Contact form route handlers.
//!
//! There is no mail integration: a valid message is logged (and becomes a
//! Sentry breadcrumb) and the visitor is shown a confirmation.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use atelier_core::ValidationErrors;
use atelier_core::forms::ContactForm;

use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::PageContext;

/// Query parameters for the confirmation banner.
#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub success: Option<String>,
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub ctx: PageContext,
    pub name: String,
    pub email: String,
    pub message: String,
    pub errors: ValidationErrors,
    pub success: Option<String>,
}

impl ContactTemplate {
    fn blank(ctx: PageContext) -> Self {
        Self {
            ctx,
            name: String::new(),
            email: String::new(),
            message: String::new(),
            errors: ValidationErrors::new(),
            success: None,
        }
    }
}

/// Display the contact form.
///
/// Signed-in visitors get their name prefilled.
#[instrument(skip(ctx))]
pub async fn show(ctx: PageContext, Query(query): Query<ContactQuery>) -> impl IntoResponse {
    let name = ctx
        .customer
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_default();

    ContactTemplate {
        name,
        success: query
            .success
            .is_some()
            .then(|| "Your message has been sent successfully.".to_string()),
        ..ContactTemplate::blank(ctx)
    }
}

/// Handle contact form submission.
#[instrument(skip(ctx, form), fields(email = %form.email))]
pub async fn submit(ctx: PageContext, Form(form): Form<ContactForm>) -> Response {
    if let Err(errors) = form.validate() {
        let page = ContactTemplate {
            name: form.name,
            email: form.email,
            message: form.message,
            errors,
            ..ContactTemplate::blank(ctx)
        };
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    tracing::info!(
        name = %form.name.trim(),
        length = form.message.trim().chars().count(),
        "Contact message received"
    );
    add_breadcrumb("contact", "Contact message received", None);

    Redirect::to("/contact?success=sent").into_response()
}
