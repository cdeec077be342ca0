//! Application state shared across handlers.

use std::sync::Arc;

use atelier_core::{Catalog, CatalogError};

use crate::config::StorefrontConfig;
use crate::content::{ContentError, ContentStore};
use crate::services::{UserApiError, UserServiceClient};

/// Error building the application state at startup.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to read catalog {path}: {source}")]
    CatalogIo {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("failed to load content: {0}")]
    Content(#[from] ContentError),
    #[error("failed to create user service client: {0}")]
    UserApi(#[from] UserApiError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the catalog, content pages, the user service client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Catalog,
    content: ContentStore,
    users: UserServiceClient,
}

impl AppState {
    /// Create the application state from configuration.
    ///
    /// Reads the product fixture and content pages from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or is invalid, the
    /// content directory cannot be read, or the HTTP client fails to build.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let json =
            std::fs::read_to_string(&config.catalog_path).map_err(|source| StateError::CatalogIo {
                path: config.catalog_path.display().to_string(),
                source,
            })?;
        let catalog = Catalog::from_json(&json)?;
        tracing::info!(products = catalog.len(), "Catalog loaded");

        let content = ContentStore::load(&config.content_dir)?;
        tracing::info!(pages = content.len(), "Content loaded");

        Self::from_parts(config, catalog, content)
    }

    /// Create the application state from already-loaded parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_parts(
        config: StorefrontConfig,
        catalog: Catalog,
        content: ContentStore,
    ) -> Result<Self, StateError> {
        let users =
            UserServiceClient::new(&config.api_url, config.api_timeout, config.user_cache_ttl)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                content,
                users,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the content pages.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    /// Get a reference to the user service client.
    #[must_use]
    pub fn users(&self) -> &UserServiceClient {
        &self.inner.users
    }
}
