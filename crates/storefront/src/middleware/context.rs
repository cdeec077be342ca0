//! Per-request page context for the shared layout.
//!
//! Every full page renders the header cart badge and the account menu; this
//! extractor gathers both from the session along with the CSP nonce.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use atelier_core::Cart;
use tower_sessions::Session;

use super::csp::CspNonce;
use crate::models::{CurrentCustomer, session_keys};

/// The signed-in customer as shown in the header.
#[derive(Debug, Clone)]
pub struct HeaderCustomer {
    pub name: String,
    pub initials: String,
    pub avatar_url: Option<String>,
}

impl From<&CurrentCustomer> for HeaderCustomer {
    fn from(customer: &CurrentCustomer) -> Self {
        Self {
            name: customer.display_name(),
            initials: customer.initials(),
            avatar_url: customer.avatar_url.clone(),
        }
    }
}

/// Layout data shared by every full-page template.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub cart_count: u32,
    pub customer: Option<HeaderCustomer>,
    pub nonce: String,
    pub path: String,
}

impl PageContext {
    /// Whether a nav link points at the current page.
    #[must_use]
    pub fn is_current(&self, href: &str) -> bool {
        if href == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(href)
        }
    }

    /// Return a copy with a different customer, for handlers that just
    /// signed someone in or out.
    #[must_use]
    pub fn with_customer(mut self, customer: Option<&CurrentCustomer>) -> Self {
        self.customer = customer.map(HeaderCustomer::from);
        self
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0)
            .path()
            .to_string();

        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self {
                nonce,
                path,
                ..Self::default()
            });
        };

        let cart_count = session
            .get::<Cart>(session_keys::CART)
            .await
            .ok()
            .flatten()
            .map_or(0, |cart| cart.total_items());

        let customer = session
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await
            .ok()
            .flatten();

        Ok(Self {
            cart_count,
            customer: customer.as_ref().map(HeaderCustomer::from),
            nonce,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_current() {
        let ctx = PageContext {
            path: "/products/3".to_string(),
            ..PageContext::default()
        };
        assert!(ctx.is_current("/products"));
        assert!(!ctx.is_current("/"));
        assert!(!ctx.is_current("/cart"));

        let home = PageContext {
            path: "/".to_string(),
            ..PageContext::default()
        };
        assert!(home.is_current("/"));
    }
}
