//! Domain models for storefront.

pub mod session;

pub use session::CurrentCustomer;
pub use session::keys as session_keys;
