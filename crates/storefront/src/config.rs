//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Base URL of the user service (e.g., `https://users.example.com/api`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront; `https://` enables secure cookies
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_CATALOG_PATH` - Product fixture (default: `crates/storefront/data/products.json`)
//! - `STOREFRONT_CONTENT_DIR` - Markdown content (default: `crates/storefront/content`)
//! - `STOREFRONT_STATIC_DIR` - Static assets (default: `crates/storefront/static`)
//! - `STOREFRONT_API_TIMEOUT_SECS` - User service request timeout (default: 10)
//! - `STOREFRONT_USER_CACHE_TTL_SECS` - User profile cache TTL (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0-1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0-1.0 (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// User service base URL
    pub api_url: Url,
    /// Product fixture path
    pub catalog_path: PathBuf,
    /// Markdown content directory
    pub content_dir: PathBuf,
    /// Static asset directory
    pub static_dir: PathBuf,
    /// Timeout for each user service request
    pub api_timeout: Duration,
    /// How long fetched user profiles are cached
    pub user_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Configuration with every optional value at its default.
    #[must_use]
    pub fn new(api_url: Url, base_url: impl Into<String>) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: base_url.into(),
            api_url,
            catalog_path: PathBuf::from("crates/storefront/data/products.json"),
            content_dir: PathBuf::from("crates/storefront/content"),
            static_dir: PathBuf::from("crates/storefront/static"),
            api_timeout: Duration::from_secs(10),
            user_cache_ttl: Duration::from_secs(60),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_url = env.url("STOREFRONT_API_URL")?;
        let base_url = env.url("STOREFRONT_BASE_URL")?;
        let mut config = Self::new(api_url, base_url.as_str().trim_end_matches('/'));

        config.host = env.parsed_or("STOREFRONT_HOST", config.host)?;
        config.port = env.parsed_or("STOREFRONT_PORT", config.port)?;
        if let Some(path) = env.optional("STOREFRONT_CATALOG_PATH") {
            config.catalog_path = PathBuf::from(path);
        }
        if let Some(dir) = env.optional("STOREFRONT_CONTENT_DIR") {
            config.content_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env.optional("STOREFRONT_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        config.api_timeout = Duration::from_secs(env.parsed_or("STOREFRONT_API_TIMEOUT_SECS", 10)?);
        config.user_cache_ttl =
            Duration::from_secs(env.parsed_or("STOREFRONT_USER_CACHE_TTL_SECS", 60)?);

        config.sentry_dsn = env.optional("SENTRY_DSN");
        config.sentry_environment = env.optional("SENTRY_ENVIRONMENT");
        config.sentry_sample_rate = env.rate_or("SENTRY_SAMPLE_RATE", 1.0)?;
        config.sentry_traces_sample_rate = env.rate_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?;

        Ok(config)
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the site is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a required absolute HTTP(S) URL.
    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let value = self.required(key)?;
        let url = Url::parse(value.trim())
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(url)
    }

    /// Parse a variable, or use the default when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Parse a sample rate in `0.0..=1.0`.
    fn rate_or(&self, key: &str, default: f32) -> Result<f32, ConfigError> {
        let rate = self.parsed_or(key, default)?;
        if (0.0..=1.0).contains(&rate) {
            Ok(rate)
        } else {
            Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("must be between 0.0 and 1.0 (got {rate})"),
            ))
        }
    }
}
