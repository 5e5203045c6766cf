//! Middleware stack for the subscriber stream listener.
//!
//! Layer order: Request → CORS → Tracing → (on `/events` only) RateLimit → Handler
//!
//! Rate limiting applies to new subscriber connections only. Preflight
//! requests and the health probe are never limited.

pub mod cors;
pub mod rate_limit;
pub mod tracing;

pub use cors::create_cors_layer;
pub use rate_limit::{cleanup_task, RateLimitLayer, RateLimitState};
pub use tracing::TracingLayer;
