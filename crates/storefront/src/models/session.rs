//! Session-related types.
//!
//! Types stored in the visitor's session: the signed-in customer and the
//! keys under which cart, checkout and order state live.

use std::fmt;

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::UserId;

use crate::services::user_api::{LoginResponse, RefreshResponse, UserResponse};

/// Refresh this long before the access token actually expires.
const EXPIRY_LEEWAY_SECONDS: i64 = 30;

/// Upper bound on a token lifetime reported by the user service (30 days).
const MAX_TOKEN_LIFETIME_SECONDS: i64 = 30 * 24 * 60 * 60;

/// When a token issued at `now` with the given lifetime expires.
///
/// Lifetimes outside `0..=30 days` are clamped.
fn token_expiry(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECONDS))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(now)
}

/// Session-stored customer identity and tokens.
///
/// Tokens are opaque values from the user service; they are never validated
/// locally. `Debug` redacts them.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CurrentCustomer {
    /// Build from a login response and, when it could be fetched, the user.
    ///
    /// Without a user record only the email used to sign in is known.
    #[must_use]
    pub fn from_login(
        login: LoginResponse,
        email: &str,
        user: Option<UserResponse>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut customer = Self {
            user_id: login.user_id,
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            phone_number: None,
            avatar_url: None,
            roles: login.roles,
            access_token: login.access_token,
            refresh_token: login.refresh_token,
            expires_at: token_expiry(now, login.expires_in),
        };
        if let Some(user) = user {
            customer.apply_user(user);
        }
        customer
    }

    /// Copy profile fields from a fresh user record.
    pub fn apply_user(&mut self, user: UserResponse) {
        self.email = user.email;
        self.first_name = user.first_name;
        self.last_name = user.last_name;
        self.phone_number = user.phone_number.filter(|p| !p.trim().is_empty());
        self.avatar_url = user.image_url.filter(|u| !u.trim().is_empty());
    }

    /// Swap in refreshed tokens.
    pub fn apply_refresh(&mut self, refresh: RefreshResponse, now: DateTime<Utc>) {
        self.access_token = refresh.access_token;
        if let Some(token) = refresh.refresh_token {
            self.refresh_token = token;
        }
        self.expires_at = token_expiry(now, refresh.expires_in);
    }

    /// Whether the access token is expired (or about to be).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECONDS) >= self.expires_at
    }

    /// Name for the header: full name, else the email.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    /// Up to two initials for the avatar fallback.
    #[must_use]
    pub fn initials(&self) -> String {
        let initials: String = [&self.first_name, &self.last_name]
            .iter()
            .filter_map(|part| part.trim().chars().next())
            .flat_map(char::to_uppercase)
            .collect();

        if initials.is_empty() {
            self.email
                .chars()
                .next()
                .map(|c| c.to_uppercase().collect::<String>())
                .unwrap_or_default()
        } else {
            initials
        }
    }
}

impl fmt::Debug for CurrentCustomer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentCustomer")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("roles", &self.roles)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for the applied coupon code.
    pub const COUPON: &str = "coupon";

    /// Key for the checkout wizard state.
    pub const CHECKOUT: &str = "checkout";

    /// Key for the most recently placed order.
    pub const LAST_ORDER: &str = "last_order";

    /// Key for a shipping address the visitor asked us to remember.
    pub const SAVED_ADDRESS: &str = "saved_address";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn login() -> LoginResponse {
        serde_json::from_value(serde_json::json!({
            "userId": 42,
            "accessToken": "at-1",
            "refreshToken": "rt-1",
            "expiresIn": 900,
            "roles": ["CUSTOMER"]
        }))
        .unwrap()
    }

    fn user() -> UserResponse {
        UserResponse {
            user_id: UserId::new(42),
            first_name: "emma".to_string(),
            last_name: "Reed".to_string(),
            phone_number: Some(String::new()),
            email: "emma@example.com".to_string(),
            image_url: Some("https://cdn.example.com/u/42.png".to_string()),
        }
    }

    #[test]
    fn test_from_login_with_user() {
        let now = Utc::now();
        let customer = CurrentCustomer::from_login(login(), "typed@example.com", Some(user()), now);
        assert_eq!(customer.email, "emma@example.com");
        assert_eq!(customer.display_name(), "emma Reed");
        assert_eq!(customer.initials(), "ER");
        assert_eq!(customer.phone_number, None);
        assert_eq!(customer.expires_at, now + Duration::seconds(900));
    }

    #[test]
    fn test_from_login_without_user_falls_back_to_email() {
        let customer = CurrentCustomer::from_login(login(), "emma@example.com", None, Utc::now());
        assert_eq!(customer.display_name(), "emma@example.com");
        assert_eq!(customer.initials(), "E");
    }

    #[test]
    fn test_expiry_with_leeway() {
        let now = Utc::now();
        let customer = CurrentCustomer::from_login(login(), "emma@example.com", None, now);
        assert!(!customer.is_expired(now));
        assert!(customer.is_expired(now + Duration::seconds(880)));
    }

    #[test]
    fn test_apply_refresh_keeps_refresh_token_unless_rotated() {
        let now = Utc::now();
        let mut customer = CurrentCustomer::from_login(login(), "emma@example.com", None, now);

        let refresh: RefreshResponse =
            serde_json::from_str(r#"{"accessToken":"at-2","expiresIn":60}"#).unwrap();
        customer.apply_refresh(refresh, now);
        assert_eq!(customer.access_token, "at-2");
        assert_eq!(customer.refresh_token, "rt-1");

        let refresh: RefreshResponse = serde_json::from_str(
            r#"{"accessToken":"at-3","expiresIn":60,"refreshToken":"rt-2"}"#,
        )
        .unwrap();
        customer.apply_refresh(refresh, now);
        assert_eq!(customer.refresh_token, "rt-2");
    }

    #[test]
    fn test_out_of_range_lifetimes_are_clamped() {
        let now = Utc::now();
        let mut login = login();
        login.expires_in = i64::MAX;
        let mut customer = CurrentCustomer::from_login(login, "emma@example.com", None, now);
        assert_eq!(
            customer.expires_at,
            now + Duration::seconds(MAX_TOKEN_LIFETIME_SECONDS)
        );

        let refresh: RefreshResponse =
            serde_json::from_str(r#"{"accessToken":"at-2","expiresIn":-9223372036854775808}"#)
                .unwrap();
        customer.apply_refresh(refresh, now);
        assert_eq!(customer.expires_at, now);
        assert!(customer.is_expired(now));
    }

    #[test]
    fn test_huge_lifetime_from_service_json() {
        let login: LoginResponse = serde_json::from_str(
            r#"{"userId":42,"accessToken":"at-1","refreshToken":"rt-1","expiresIn":9223372036854775807}"#,
        )
        .unwrap();
        let now = Utc::now();
        let customer = CurrentCustomer::from_login(login, "emma@example.com", None, now);
        assert!(!customer.is_expired(now));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let customer = CurrentCustomer::from_login(login(), "emma@example.com", None, Utc::now());
        let debug = format!("{customer:?}");
        assert!(!debug.contains("at-1"));
        assert!(!debug.contains("rt-1"));
    }
}
