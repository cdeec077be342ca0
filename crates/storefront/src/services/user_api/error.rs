//! User service error types.

use thiserror::Error;

/// Errors from the user service client.
#[derive(Debug, Error)]
pub enum UserApiError {
    /// Transport failure (connection refused, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The bearer token was rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// The refresh token was rejected; the visitor must sign in again.
    #[error("Session expired")]
    SessionExpired,

    /// The response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl UserApiError {
    /// Message that is safe to show to the visitor.
    ///
    /// Service-provided messages are passed through; transport and parse
    /// failures collapse to a generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Unauthorized | Self::SessionExpired => {
                "Your session has expired. Please sign in again.".to_string()
            }
            Self::Http(_) | Self::Parse(_) => {
                "We could not reach the account service. Please try again.".to_string()
            }
        }
    }

    /// Whether the failure means the visitor's tokens are no longer usable.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionExpired)
    }
}
