//! REST client for the external user service.
//!
//! All account state lives in that service: credentials, profile data,
//! avatars. The storefront only relays requests with the visitor's bearer
//! token. Failures are returned as-is; there is no retry.
//!
//! `get_user` results are cached with `moka` for a short TTL and invalidated
//! whenever the storefront changes the user.

mod error;
mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use atelier_core::UserId;

pub use error::UserApiError;
pub use types::{
    Avatar, ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    SignUpRequest, UpdateUserRequest, UserResponse,
};

use types::ErrorEnvelope;

/// Maximum number of cached users.
const USER_CACHE_CAPACITY: u64 = 10_000;

/// Client for the user service.
///
/// Cheap to clone; clones share the connection pool and the user cache.
#[derive(Clone)]
pub struct UserServiceClient {
    inner: Arc<UserServiceClientInner>,
}

struct UserServiceClientInner {
    client: reqwest::Client,
    base_url: String,
    users: Cache<UserId, UserResponse>,
}

impl UserServiceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(
        base_url: &Url,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> Result<Self, UserApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let users = Cache::builder()
            .max_capacity(USER_CACHE_CAPACITY)
            .time_to_live(cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(UserServiceClientInner {
                client,
                base_url: base_url.as_str().trim_end_matches('/').to_string(),
                users,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Exchange credentials for tokens.
    ///
    /// # Errors
    ///
    /// Returns `UserApiError::Api` with the service's message on rejected
    /// credentials, or a transport/parse error.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginResponse, UserApiError> {
        let body = LoginRequest {
            username,
            password: password.expose_secret(),
        };

        let response = self
            .inner
            .client
            .post(self.endpoint("/auth/log-in"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Login failed").await);
        }

        parse_json(response).await
    }

    /// Get a fresh access token.
    ///
    /// # Errors
    ///
    /// Any failure is reported as `UserApiError::SessionExpired`, except
    /// transport errors which are passed through.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, UserApiError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("/auth/refresh"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Token refresh rejected");
            return Err(UserApiError::SessionExpired);
        }

        parse_json(response)
            .await
            .map_err(|_| UserApiError::SessionExpired)
    }

    /// Revoke the access token.
    ///
    /// # Errors
    ///
    /// Returns error if the service does not answer 204.
    #[instrument(skip(self, access_token))]
    pub async fn logout(&self, access_token: &str, user_id: UserId) -> Result<(), UserApiError> {
        self.inner.users.invalidate(&user_id).await;

        let response = self
            .inner
            .client
            .post(self.endpoint("/auth/log-out"))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(authed_error(response, "Logout failed").await);
        }

        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a customer account.
    ///
    /// # Errors
    ///
    /// Anything other than `201 Created` is an error; the service message is
    /// used when present, otherwise "Signup failed".
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: &SignUpRequest) -> Result<(), UserApiError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("/users/customer/create"))
            .json(request)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(api_error(response, "Signup failed").await);
        }

        Ok(())
    }

    /// Fetch a user, from cache when possible.
    ///
    /// # Errors
    ///
    /// `Unauthorized` on 401, `Api` on other error statuses.
    #[instrument(skip(self, access_token))]
    pub async fn get_user(
        &self,
        access_token: &str,
        user_id: UserId,
    ) -> Result<UserResponse, UserApiError> {
        if let Some(user) = self.inner.users.get(&user_id).await {
            debug!("User cache hit");
            return Ok(user);
        }

        let response = self
            .inner
            .client
            .get(self.endpoint(&format!("/users/{user_id}")))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(authed_error(response, "Failed to fetch user").await);
        }

        let user: UserResponse = parse_json(response).await?;
        self.inner.users.insert(user_id, user.clone()).await;
        Ok(user)
    }

    /// Update profile details.
    ///
    /// # Errors
    ///
    /// `Unauthorized` on 401, `Api` on other error statuses.
    #[instrument(skip(self, access_token, request))]
    pub async fn update_user(
        &self,
        access_token: &str,
        user_id: UserId,
        request: &UpdateUserRequest,
    ) -> Result<UserResponse, UserApiError> {
        self.inner.users.invalidate(&user_id).await;

        let response = self
            .inner
            .client
            .patch(self.endpoint(&format!("/users/{user_id}")))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(authed_error(response, "Failed to update profile").await);
        }

        let user: UserResponse = parse_json(response).await?;
        self.inner.users.insert(user_id, user.clone()).await;
        Ok(user)
    }

    /// Change the password.
    ///
    /// # Errors
    ///
    /// `Unauthorized` on 401, `Api` on other error statuses (for example a
    /// wrong current password).
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn change_password(
        &self,
        access_token: &str,
        user_id: UserId,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), UserApiError> {
        let body = ChangePasswordRequest {
            current_password: current_password.expose_secret(),
            new_password: new_password.expose_secret(),
        };

        let response = self
            .inner
            .client
            .put(self.endpoint(&format!("/users/{user_id}/password")))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(authed_error(response, "Failed to change password").await);
        }

        Ok(())
    }

    /// Upload a new avatar as multipart field `file`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` on 401, `Api` on other error statuses, `Parse` if the
    /// content type is not a valid MIME type.
    #[instrument(skip(self, access_token, avatar), fields(size = avatar.bytes.len()))]
    pub async fn upload_avatar(
        &self,
        access_token: &str,
        user_id: UserId,
        avatar: Avatar,
    ) -> Result<UserResponse, UserApiError> {
        self.inner.users.invalidate(&user_id).await;

        let part = reqwest::multipart::Part::bytes(avatar.bytes)
            .file_name(avatar.file_name)
            .mime_str(&avatar.content_type)
            .map_err(|e| UserApiError::Parse(format!("Invalid content type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .inner
            .client
            .post(self.endpoint(&format!("/users/{user_id}/image")))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(authed_error(response, "Failed to upload image").await);
        }

        let user: UserResponse = parse_json(response).await?;
        self.inner.users.insert(user_id, user.clone()).await;
        Ok(user)
    }

    /// Drop a cached user.
    pub async fn invalidate_user(&self, user_id: UserId) {
        self.inner.users.invalidate(&user_id).await;
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, UserApiError> {
    response
        .json()
        .await
        .map_err(|e| UserApiError::Parse(e.to_string()))
}

/// Error for an endpoint that requires a bearer token: 401 means the token
/// was rejected.
async fn authed_error(response: Response, fallback: &str) -> UserApiError {
    if response.status() == StatusCode::UNAUTHORIZED {
        return UserApiError::Unauthorized;
    }
    api_error(response, fallback).await
}

/// Decode the service's error envelope, falling back to a fixed message.
async fn api_error(response: Response, fallback: &str) -> UserApiError {
    let status = response.status().as_u16();

    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => {
            debug!(
                status,
                kind = envelope.error.kind.as_deref().unwrap_or_default(),
                "User service error"
            );
            UserApiError::Api {
                status,
                code: envelope.error.code_text(),
                message: envelope
                    .error
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            }
        }
        Err(_) => UserApiError::Api {
            status,
            code: None,
            message: fallback.to_string(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn response(status: u16, body: &'static str) -> Response {
        Response::from(
            axum::http::Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = UserServiceClient::new(
            &Url::parse("http://users.internal:8080/api/").unwrap(),
            Duration::from_secs(5),
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(
            client.endpoint("/auth/log-in"),
            "http://users.internal:8080/api/auth/log-in"
        );
    }

    #[tokio::test]
    async fn test_api_error_uses_envelope_message() {
        let err = api_error(
            response(
                400,
                r#"{"error":{"code":"BAD_CREDENTIALS","type":"AUTH","message":"Invalid username or password"}}"#,
            ),
            "Login failed",
        )
        .await;

        match err {
            UserApiError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("BAD_CREDENTIALS"));
                assert_eq!(message, "Invalid username or password");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_error_falls_back_on_unknown_body() {
        let err = api_error(response(500, "<html>oops</html>"), "Signup failed").await;
        assert_eq!(err.user_message(), "Signup failed");
    }

    #[tokio::test]
    async fn test_authed_error_maps_401() {
        let err = authed_error(response(401, "{}"), "Failed to fetch user").await;
        assert!(matches!(err, UserApiError::Unauthorized));
    }
}
