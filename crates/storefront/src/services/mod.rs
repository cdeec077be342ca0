//! Clients for external services.
//!
//! # Services
//!
//! - `user_api` - Authentication and customer accounts (REST, bearer tokens)

pub mod user_api;

pub use user_api::{UserApiError, UserServiceClient};
