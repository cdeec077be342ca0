//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID
//! 4. Security headers (reads the nonce)
//! 5. CSP nonce
//! 6. Session layer (tower-sessions in-memory store)
//!
//! Rate limiting is attached per route to the credential POST endpoints.

pub mod auth;
pub mod context;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAuth, clear_current_customer, expire_session, is_local_path,
    set_current_customer,
};
pub use context::PageContext;
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
