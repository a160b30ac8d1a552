//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Panic catcher (generic 500 JSON body)
//! 2. Sentry layers (hub per request, transaction per route)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (add unique ID to each request)
//! 5. CORS (credentials allowed for the configured origins)
//! 6. Security headers
//! 7. Rate limiting (governor), per route group
//!
//! Authentication is not a layer: handlers take [`RequireUser`] or
//! [`RequireSeller`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireSeller, RequireUser, SELLER_COOKIE, USER_COOKIE, removal_cookie, session_cookie};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
