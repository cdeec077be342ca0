//! Request and response bodies for the user service.
//!
//! The service speaks camelCase JSON. Types carrying passwords or tokens
//! implement `Debug` by hand so they never end up in logs.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use atelier_core::UserId;
use atelier_core::forms::SignupForm;

/// `POST /auth/log-in` body.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful login.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("roles", &self.roles)
            .finish()
    }
}

/// `POST /auth/refresh` body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Successful token refresh.
///
/// Some deployments rotate the refresh token as well.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// `POST /users/customer/create` body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub email: String,
    pub password: String,
}

impl SignUpRequest {
    /// Build from a validated signup form.
    ///
    /// The service expects the signup password base64-encoded; names and
    /// email are trimmed.
    #[must_use]
    pub fn from_form(form: &SignupForm) -> Self {
        Self {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            phone_number: form.phone().map(str::to_string),
            email: form.email.trim().to_string(),
            password: STANDARD.encode(form.password.as_bytes()),
        }
    }
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A user as returned by `GET /users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub email: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// `PATCH /users/{id}` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

/// `PUT /users/{id}/password` body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

/// An avatar image to upload.
#[derive(Clone)]
pub struct Avatar {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Avatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Avatar")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Error envelope used by the service: `{"error": {code, type, message}}`.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// The code as text; services send it as either a string or a number.
    pub fn code_text(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_from_camel_case() {
        let json = r#"{
            "userId": 42,
            "accessToken": "at-123",
            "refreshToken": "rt-456",
            "expiresIn": 900,
            "roles": ["CUSTOMER"]
        }"#;
        let login: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(login.user_id, UserId::new(42));
        assert_eq!(login.expires_in, 900);
        assert_eq!(login.roles, vec!["CUSTOMER"]);

        let debug = format!("{login:?}");
        assert!(!debug.contains("at-123"));
        assert!(!debug.contains("rt-456"));
    }

    #[test]
    fn test_user_response_tolerates_missing_optionals() {
        let json = r#"{"userId": 7, "firstName": "Emma", "lastName": "Reed", "email": "emma@example.com"}"#;
        let user: UserResponse = serde_json::from_str(json).unwrap();
        assert_eq!(user.phone_number, None);
        assert_eq!(user.image_url, None);
    }

    #[test]
    fn test_signup_request_shape() {
        let request = SignUpRequest {
            first_name: "Emma".to_string(),
            last_name: "Reed".to_string(),
            phone_number: None,
            email: "emma@example.com".to_string(),
            password: "correct horse".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["firstName"], "Emma");
        assert!(value.get("phoneNumber").is_none());
        assert!(!format!("{request:?}").contains("correct horse"));
    }

    #[test]
    fn test_signup_request_from_form_encodes_password() {
        let form = SignupForm {
            first_name: " Emma ".to_string(),
            last_name: "Reed".to_string(),
            email: "emma@example.com ".to_string(),
            phone_number: Some("  ".to_string()),
            password: "hunter22".to_string(),
            confirm_password: "hunter22".to_string(),
        };
        let request = SignUpRequest::from_form(&form);
        assert_eq!(request.first_name, "Emma");
        assert_eq!(request.email, "emma@example.com");
        assert_eq!(request.phone_number, None);
        assert_eq!(request.password, "aHVudGVyMjI=");
    }

    #[test]
    fn test_error_envelope_code_variants() {
        let body: ErrorEnvelope = serde_json::from_str(
            r#"{"error": {"code": "USER_EXISTS", "type": "CONFLICT", "message": "Email already registered"}}"#,
        )
        .unwrap();
        assert_eq!(body.error.code_text().as_deref(), Some("USER_EXISTS"));
        assert_eq!(body.error.kind.as_deref(), Some("CONFLICT"));

        let body: ErrorEnvelope =
            serde_json::from_str(r#"{"error": {"code": 409, "message": "taken"}}"#).unwrap();
        assert_eq!(body.error.code_text().as_deref(), Some("409"));
    }
}
