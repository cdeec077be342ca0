//! Authentication route handlers.
//!
//! Login, signup and logout against the external user service. Credentials
//! are never stored: the service's tokens go into the session and the
//! password only lives for the duration of the request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::ValidationErrors;
use atelier_core::forms::{LoginForm, SignupForm};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalAuth, PageContext, clear_current_customer, is_local_path, set_current_customer,
};
use crate::models::{CurrentCustomer, session_keys};
use crate::services::UserApiError;
use crate::services::user_api::SignUpRequest;
use crate::state::AppState;

/// Where to go after signing in when no `next` was given.
const DEFAULT_AFTER_LOGIN: &str = "/profile";

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display and the post-login target.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

impl AuthQuery {
    /// The post-login target, if it is a local path.
    fn safe_next(&self) -> Option<String> {
        self.next.clone().filter(|n| is_local_path(n))
    }
}

fn error_message(code: &str) -> &'static str {
    match code {
        "session_expired" => "Your session has expired. Please sign in again.",
        "session" => "We could not start your session. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "signed_up" => Some("Account created successfully! Please sign in."),
        "logged_out" => Some("Logged out successfully!"),
        _ => None,
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub next: Option<String>,
    pub errors: ValidationErrors,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub ctx: PageContext,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub next: Option<String>,
    pub errors: ValidationErrors,
    pub error: Option<String>,
}

impl SignupTemplate {
    fn blank(ctx: PageContext, next: Option<String>) -> Self {
        Self {
            ctx,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            next,
            errors: ValidationErrors::new(),
            error: None,
        }
    }

    fn refill(ctx: PageContext, form: &SignupForm, next: Option<String>) -> Self {
        Self {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            phone_number: form.phone_number.clone().unwrap_or_default(),
            ..Self::blank(ctx, next)
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
///
/// Signed-in visitors are sent straight on.
pub async fn login_page(
    OptionalAuth(customer): OptionalAuth,
    ctx: PageContext,
    Query(query): Query<AuthQuery>,
) -> Response {
    let next = query.safe_next();
    if customer.is_some() {
        return Redirect::to(next.as_deref().unwrap_or(DEFAULT_AFTER_LOGIN)).into_response();
    }

    LoginTemplate {
        ctx,
        email: String::new(),
        next,
        errors: ValidationErrors::new(),
        error: query.error.as_deref().map(|c| error_message(c).to_string()),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(str::to_string),
    }
    .into_response()
}

/// Handle login form submission.
///
/// On success the session id is cycled, the tokens and profile are stored,
/// and the visitor is redirected to `next` or their profile. If the profile
/// cannot be fetched the visitor is still signed in with just their email.
///
/// # Errors
///
/// Returns 500 if the session cannot be written.
#[instrument(skip(state, session, ctx, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Query(query): Query<AuthQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = query.safe_next();
    let email = form.email.trim().to_string();

    let page = |errors: ValidationErrors, error: Option<String>| LoginTemplate {
        ctx: ctx.clone(),
        email: email.clone(),
        next: next.clone(),
        errors,
        error,
        success: None,
    };

    if let Err(errors) = form.validate() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page(errors, None)).into_response());
    }

    let password = SecretString::from(form.password);
    let login = match state.users().login(&email, &password).await {
        Ok(login) => login,
        Err(e) => {
            tracing::warn!("Login failed: {e}");
            let status = if e.is_auth_failure() || matches!(e, UserApiError::Api { .. }) {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::BAD_GATEWAY
            };
            let page = page(ValidationErrors::new(), Some(e.user_message()));
            return Ok((status, page).into_response());
        }
    };

    let user = match state.users().get_user(&login.access_token, login.user_id).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(user_id = %login.user_id, "Failed to fetch user after login: {e}");
            None
        }
    };

    let customer = CurrentCustomer::from_login(login, &email, user, Utc::now());

    session.cycle_id().await?;
    set_current_customer(&session, &customer).await?;
    set_sentry_user(&customer.user_id, Some(&customer.email));
    tracing::info!(user_id = %customer.user_id, "Customer signed in");

    Ok(Redirect::to(next.as_deref().unwrap_or(DEFAULT_AFTER_LOGIN)).into_response())
}

// =============================================================================
// Signup Routes
// =============================================================================

/// Display the signup page.
pub async fn signup_page(
    OptionalAuth(customer): OptionalAuth,
    ctx: PageContext,
    Query(query): Query<AuthQuery>,
) -> Response {
    if customer.is_some() {
        return Redirect::to(DEFAULT_AFTER_LOGIN).into_response();
    }

    SignupTemplate::blank(ctx, query.safe_next()).into_response()
}

/// Handle signup form submission.
///
/// The new account is not signed in; the visitor is sent to the login page
/// (keeping `next`).
#[instrument(skip(state, ctx, form), fields(email = %form.email))]
pub async fn signup(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<AuthQuery>,
    Form(form): Form<SignupForm>,
) -> Response {
    let next = query.safe_next();

    if let Err(errors) = form.validate() {
        let page = SignupTemplate {
            errors,
            ..SignupTemplate::refill(ctx, &form, next)
        };
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    match state.users().signup(&SignUpRequest::from_form(&form)).await {
        Ok(()) => {
            tracing::info!("Customer account created");
            let mut target = "/auth/login?success=signed_up".to_string();
            if let Some(next) = &next {
                target.push_str("&next=");
                target.push_str(&urlencoding::encode(next));
            }
            Redirect::to(&target).into_response()
        }
        Err(e) => {
            tracing::warn!("Signup failed: {e}");
            let status = if matches!(e, UserApiError::Api { .. }) {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::BAD_GATEWAY
            };
            let page = SignupTemplate {
                error: Some(e.user_message()),
                ..SignupTemplate::refill(ctx, &form, next)
            };
            (status, page).into_response()
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Revokes the token with the user service (best effort) and destroys the
/// whole session, cart included.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Redirect {
    if let Ok(Some(customer)) = session
        .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
    {
        if let Err(e) = state
            .users()
            .logout(&customer.access_token, customer.user_id)
            .await
        {
            tracing::warn!(user_id = %customer.user_id, "Remote logout failed: {e}");
        }
        tracing::info!(user_id = %customer.user_id, "Customer signed out");
    }

    if let Err(e) = clear_current_customer(&session).await {
        tracing::error!("Failed to clear session: {e}");
    }

    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {e}");
    }

    clear_sentry_user();
    Redirect::to("/auth/login?success=logged_out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_rejects_external_targets() {
        let query = AuthQuery {
            next: Some("https://evil.example.com".to_string()),
            ..AuthQuery::default()
        };
        assert_eq!(query.safe_next(), None);

        let query = AuthQuery {
            next: Some("/checkout".to_string()),
            ..AuthQuery::default()
        };
        assert_eq!(query.safe_next().as_deref(), Some("/checkout"));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            error_message("session_expired"),
            "Your session has expired. Please sign in again."
        );
        assert_eq!(
            success_message("signed_up"),
            Some("Account created successfully! Please sign in.")
        );
        assert_eq!(success_message("other"), None);
    }
}
