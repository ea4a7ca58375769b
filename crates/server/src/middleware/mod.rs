//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//! 4. Rate limiting (governor) on login and license validation
//!
//! Authorization happens in extractors: staff roles from the session,
//! terminals from their license token, scheduled jobs from `CRON_SECRET`.

pub mod auth;
pub mod rate_limit;
pub mod session;

pub use auth::{
    RequireAuth, RequireCron, RequireManager, RequireOwner, RequireSuperAdmin, RequireTerminal,
    clear_current_user, set_current_user,
};
pub use rate_limit::{license_rate_limiter, login_rate_limiter};
pub use session::create_session_layer;
