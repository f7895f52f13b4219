//! HTTP middleware stack for the passport server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Rate limiting on check-in endpoints (governor)
//!
//! Caller identity comes from the [`RequireUser`] extractor rather than a layer.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{GATEWAY_SECRET_HEADER, RequireUser, USER_ID_HEADER};
pub use rate_limit::{ClientIpKeyExtractor, RateLimitConfigError, check_in_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
