//! Domain types for the push gateway: configuration and errors.

pub mod config;
pub mod error;

// Re-exports for convenience
pub use config::{AdminConfig, ConfigError, CorsConfig, GatewayConfig, HttpConfig, RateLimitConfig};
pub use error::{ApiError, GatewayError};

/// Result type for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;
