//! Profile route handlers.
//!
//! All routes require a signed-in customer. Updates go to the user service
//! and the refreshed user record is written back into the session so the
//! header reflects the change straight away.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::ValidationErrors;
use atelier_core::forms::{PasswordChangeForm, ProfileForm};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, expire_session, set_current_customer};
use crate::models::CurrentCustomer;
use crate::services::UserApiError;
use crate::services::user_api::{Avatar, UpdateUserRequest};
use crate::state::AppState;

/// Largest avatar accepted, in bytes.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// Messages
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

fn error_message(code: &str) -> &'static str {
    match code {
        "avatar_missing" => "Please choose an image to upload.",
        "avatar_type" => "Profile pictures must be images.",
        "avatar_size" => "Profile pictures must be 5 MB or smaller.",
        "avatar" => "Failed to upload profile picture.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "profile" => Some("Profile updated successfully!"),
        "password" => Some("Password changed successfully!"),
        "avatar" => Some("Profile picture updated!"),
        _ => None,
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Profile page template.
///
/// Holds two independent forms; each has its own error set so a failed
/// password change does not clear the details form.
#[derive(Template, WebTemplate)]
#[template(path = "profile/show.html")]
pub struct ProfileTemplate {
    pub ctx: PageContext,
    pub display_name: String,
    pub initials: String,
    pub avatar_url: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub profile_errors: ValidationErrors,
    pub password_errors: ValidationErrors,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl ProfileTemplate {
    fn new(ctx: PageContext, customer: &CurrentCustomer) -> Self {
        Self {
            ctx: ctx.with_customer(Some(customer)),
            display_name: customer.display_name(),
            initials: customer.initials(),
            avatar_url: customer.avatar_url.clone(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            phone_number: customer.phone_number.clone().unwrap_or_default(),
            profile_errors: ValidationErrors::new(),
            password_errors: ValidationErrors::new(),
            error: None,
            success: None,
        }
    }
}

/// Outcome of a failed user service call from a profile route.
///
/// A rejected token ends the session; anything else is shown on the page.
async fn service_failure(session: &Session, err: &UserApiError) -> Option<Response> {
    if err.is_auth_failure() {
        tracing::info!("User service rejected token, ending session");
        expire_session(session).await;
        return Some(Redirect::to("/auth/login?error=session_expired").into_response());
    }
    None
}

const fn failure_status(err: &UserApiError) -> StatusCode {
    match err {
        UserApiError::Api { status, .. } if *status < 500 => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the profile page.
///
/// The user record is re-fetched (through the client's cache) so changes made
/// elsewhere show up; if that fails the session copy is shown.
#[instrument(skip(state, session, customer, ctx), fields(user_id = %customer.user_id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(mut customer): RequireAuth,
    ctx: PageContext,
    Query(query): Query<ProfileQuery>,
) -> Result<Response> {
    match state
        .users()
        .get_user(&customer.access_token, customer.user_id)
        .await
    {
        Ok(user) => {
            customer.apply_user(user);
            set_current_customer(&session, &customer).await?;
        }
        Err(e) => {
            if let Some(redirect) = service_failure(&session, &e).await {
                return Ok(redirect);
            }
            tracing::warn!("Failed to refresh user record: {e}");
        }
    }

    Ok(ProfileTemplate {
        error: query.error.as_deref().map(|c| error_message(c).to_string()),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(str::to_string),
        ..ProfileTemplate::new(ctx, &customer)
    }
    .into_response())
}

/// Update name, email and phone.
#[instrument(skip(state, session, customer, ctx, form), fields(user_id = %customer.user_id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(mut customer): RequireAuth,
    ctx: PageContext,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let refill = |ctx: PageContext, customer: &CurrentCustomer| ProfileTemplate {
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        email: form.email.clone(),
        phone_number: form.phone_number.clone().unwrap_or_default(),
        ..ProfileTemplate::new(ctx, customer)
    };

    if let Err(errors) = form.validate() {
        let page = ProfileTemplate {
            profile_errors: errors,
            ..refill(ctx, &customer)
        };
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    let request = UpdateUserRequest {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone_number: form.phone().map(str::to_string),
    };

    match state
        .users()
        .update_user(&customer.access_token, customer.user_id, &request)
        .await
    {
        Ok(user) => {
            customer.apply_user(user);
            set_current_customer(&session, &customer).await?;
            tracing::info!("Profile updated");
            Ok(Redirect::to("/profile?success=profile").into_response())
        }
        Err(e) => {
            if let Some(redirect) = service_failure(&session, &e).await {
                return Ok(redirect);
            }
            tracing::warn!("Profile update failed: {e}");
            let page = ProfileTemplate {
                error: Some(match &e {
                    UserApiError::Api { .. } => e.user_message(),
                    _ => "Failed to update profile.".to_string(),
                }),
                ..refill(ctx, &customer)
            };
            Ok((failure_status(&e), page).into_response())
        }
    }
}

/// Change the password.
#[instrument(skip_all, fields(user_id = %customer.user_id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    ctx: PageContext,
    Form(form): Form<PasswordChangeForm>,
) -> Result<Response> {
    if let Err(errors) = form.validate() {
        let page = ProfileTemplate {
            password_errors: errors,
            ..ProfileTemplate::new(ctx, &customer)
        };
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    let current = SecretString::from(form.current_password);
    let new = SecretString::from(form.new_password);

    match state
        .users()
        .change_password(&customer.access_token, customer.user_id, &current, &new)
        .await
    {
        Ok(()) => {
            tracing::info!("Password changed");
            Ok(Redirect::to("/profile?success=password").into_response())
        }
        Err(e) => {
            if let Some(redirect) = service_failure(&session, &e).await {
                return Ok(redirect);
            }
            tracing::warn!("Password change failed: {e}");
            let page = ProfileTemplate {
                error: Some(match &e {
                    UserApiError::Api { .. } => e.user_message(),
                    _ => "Failed to change password.".to_string(),
                }),
                ..ProfileTemplate::new(ctx, &customer)
            };
            Ok((failure_status(&e), page).into_response())
        }
    }
}

/// Read the `file` field of an avatar upload.
///
/// Returns the error code to redirect with when the upload is unusable.
async fn read_avatar(multipart: &mut Multipart) -> std::result::Result<Avatar, &'static str> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Malformed multipart body: {e}");
        "avatar_size"
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("avatar").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err("avatar_type");
        }

        let bytes = field.bytes().await.map_err(|e| {
            tracing::debug!("Failed to read avatar: {e}");
            "avatar_size"
        })?;
        if bytes.is_empty() {
            return Err("avatar_missing");
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err("avatar_size");
        }

        return Ok(Avatar {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err("avatar_missing")
}

/// Upload a new profile picture.
///
/// Accepts `image/*` up to 5 MiB in multipart field `file`.
#[instrument(skip_all, fields(user_id = %customer.user_id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(mut customer): RequireAuth,
    mut multipart: Multipart,
) -> Result<Response> {
    let avatar = match read_avatar(&mut multipart).await {
        Ok(avatar) => avatar,
        Err(code) => return Ok(Redirect::to(&format!("/profile?error={code}")).into_response()),
    };

    match state
        .users()
        .upload_avatar(&customer.access_token, customer.user_id, avatar)
        .await
    {
        Ok(user) => {
            customer.apply_user(user);
            set_current_customer(&session, &customer).await?;
            tracing::info!("Avatar updated");
            Ok(Redirect::to("/profile?success=avatar").into_response())
        }
        Err(e) => {
            if let Some(redirect) = service_failure(&session, &e).await {
                return Ok(redirect);
            }
            if matches!(e, UserApiError::Http(_)) {
                return Err(AppError::UserApi(e));
            }
            tracing::warn!("Avatar upload failed: {e}");
            Ok(Redirect::to("/profile?error=avatar").into_response())
        }
    }
}
