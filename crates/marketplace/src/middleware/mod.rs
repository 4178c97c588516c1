//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (honour or generate `x-request-id`)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Rate limiting is applied per route group (see `routes::auth`), with
//! [`rate_limit_json`] outside it so a 429 carries the usual JSON body.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, RequireSeller, clear_current_user, set_current_user,
};
pub use rate_limit::{auth_rate_limiter, rate_limit_json};
pub use request_id::request_id_middleware;
pub use security_headers::{hsts_middleware, security_headers_middleware};
pub use session::create_session_layer;
