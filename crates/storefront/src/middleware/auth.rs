//! Authentication extractors.
//!
//! The signed-in customer lives in the session. `RequireAuth` also keeps the
//! access token fresh: when it has expired the refresh token is exchanged
//! with the user service and the session is rewritten. A rejected refresh
//! signs the visitor out.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;

use crate::error::clear_sentry_user;
use crate::models::{CurrentCustomer, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in customer with a usable access token.
///
/// If the customer is not signed in, redirects to the login page with a
/// `next` parameter pointing back at the requested page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(customer): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

/// Error returned when authentication is required but unavailable.
#[derive(Debug)]
pub enum AuthRejection {
    /// Not signed in; send to the login page.
    RedirectToLogin { next: String },
    /// Tokens could not be refreshed; the visitor was signed out.
    SessionExpired,
    /// No session layer on this request.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => {
                Redirect::to(&format!("/auth/login?next={}", urlencoding::encode(&next)))
                    .into_response()
            }
            Self::SessionExpired => {
                Redirect::to("/auth/login?error=session_expired").into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::Unauthorized)?;

        let customer: CurrentCustomer = session
            .get(session_keys::CURRENT_CUSTOMER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| {
                // Nested routers see a stripped URI; the original has the full path.
                let uri = parts
                    .extensions
                    .get::<OriginalUri>()
                    .map_or(&parts.uri, |original| &original.0);
                AuthRejection::RedirectToLogin {
                    next: requested_path(uri),
                }
            })?;

        if !customer.is_expired(Utc::now()) {
            return Ok(Self(customer));
        }

        refresh_customer(state, &session, customer).await.map(Self)
    }
}

/// Path and query of the request, used as the post-login `next` target.
fn requested_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string())
}

/// Exchange the refresh token and store the new access token.
async fn refresh_customer(
    state: &AppState,
    session: &Session,
    mut customer: CurrentCustomer,
) -> Result<CurrentCustomer, AuthRejection> {
    match state.users().refresh(&customer.refresh_token).await {
        Ok(refreshed) => {
            customer.apply_refresh(refreshed, Utc::now());
            if let Err(e) = set_current_customer(session, &customer).await {
                tracing::error!("Failed to store refreshed tokens: {e}");
            }
            tracing::debug!(user_id = %customer.user_id, "Access token refreshed");
            Ok(customer)
        }
        Err(e) => {
            tracing::info!(user_id = %customer.user_id, "Token refresh failed: {e}");
            expire_session(session).await;
            Err(AuthRejection::SessionExpired)
        }
    }
}

/// Extractor that optionally gets the current customer.
///
/// Unlike `RequireAuth`, this never rejects and never refreshes tokens.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(customer))
    }
}

/// Helper to set the current customer in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Helper to clear the current customer from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    Ok(())
}

/// Sign the visitor out after the user service rejected their tokens.
///
/// The cart is kept.
pub async fn expire_session(session: &Session) {
    if let Err(e) = clear_current_customer(session).await {
        tracing::error!("Failed to clear expired customer: {e}");
    }
    clear_sentry_user();
}

/// Whether `next` is a safe local redirect target.
#[must_use]
pub fn is_local_path(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_path() {
        assert!(is_local_path("/profile"));
        assert!(is_local_path("/checkout?step=2"));
        assert!(!is_local_path("//evil.example.com"));
        assert!(!is_local_path("https://evil.example.com"));
        assert!(!is_local_path("/\\evil.example.com"));
        assert!(!is_local_path(""));
    }

    #[test]
    fn test_requested_path_keeps_query() {
        let uri: Uri = "/profile?success=profile".parse().unwrap();
        assert_eq!(requested_path(&uri), "/profile?success=profile");

        let uri: Uri = "/profile".parse().unwrap();
        assert_eq!(requested_path(&uri), "/profile");
    }

    #[test]
    fn test_rejection_redirects() {
        let response = AuthRejection::RedirectToLogin {
            next: "/profile".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/auth/login?next=%2Fprofile"
        );

        let response = AuthRejection::SessionExpired.into_response();
        assert_eq!(
            response.headers()["location"],
            "/auth/login?error=session_expired"
        );
    }
}
