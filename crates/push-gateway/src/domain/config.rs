//! Gateway configuration with validation.
//!
//! Every section is `#[serde(default)]`, so a partial file (or none at all)
//! yields a runnable configuration. [`GatewayConfig::from_env`] layers
//! `BROKER_*` environment overrides on top of the defaults.

use event_broker::BrokerConfig;
use serde::{Deserialize, Serialize};
use shared_types::duration_serde;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Subscriber stream listener
    pub http: HttpConfig,
    /// Admin and ingestion listener (localhost only by default)
    pub admin: AdminConfig,
    /// Broker tunables
    pub broker: BrokerConfig,
    /// Admission rate limiting
    pub rate_limit: RateLimitConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Port 0 asks the OS for an ephemeral port, so it never collides.
        if self.admin.enabled && self.http.port != 0 && self.http_addr() == self.admin_addr() {
            return Err(ConfigError::DuplicateAddress(self.http_addr()));
        }

        if self.broker.max_clients == 0 {
            return Err(ConfigError::InvalidLimit("max_clients cannot be 0".into()));
        }

        if self.broker.client_queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "client_queue_capacity cannot be 0".into(),
            ));
        }

        if self.broker.publish_queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "publish_queue_capacity cannot be 0".into(),
            ));
        }

        if self.rate_limit.enabled && self.rate_limit.connections_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "connections_per_second cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Defaults plus `BROKER_*` environment overrides.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        override_parsed(&lookup, "BROKER_HTTP_PORT", &mut config.http.port);
        override_parsed(&lookup, "BROKER_ADMIN_PORT", &mut config.admin.port);
        override_parsed(&lookup, "BROKER_MAX_CLIENTS", &mut config.broker.max_clients);
        override_parsed(
            &lookup,
            "BROKER_HISTORY_CAPACITY",
            &mut config.broker.history_capacity,
        );
        override_parsed(
            &lookup,
            "BROKER_CLIENT_QUEUE_CAPACITY",
            &mut config.broker.client_queue_capacity,
        );
        override_parsed(
            &lookup,
            "BROKER_PUBLISH_QUEUE_CAPACITY",
            &mut config.broker.publish_queue_capacity,
        );
        override_parsed(
            &lookup,
            "BROKER_RATE_LIMIT_ENABLED",
            &mut config.rate_limit.enabled,
        );

        if let Some(raw) = lookup("BROKER_HEARTBEAT_INTERVAL") {
            match duration_serde::parse_duration(&raw) {
                Ok(interval) => config.broker.heartbeat_interval = interval,
                Err(e) => warn!(key = "BROKER_HEARTBEAT_INTERVAL", error = %e, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup("BROKER_CORS_ORIGINS") {
            let origins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if origins.is_empty() {
                warn!(key = "BROKER_CORS_ORIGINS", "Ignoring empty override");
            } else {
                config.cors.allowed_origins = origins;
            }
        }

        config
    }

    /// Get subscriber stream bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Get admin bind address
    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::new(self.admin.host, self.admin.port)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(e) => warn!(key, value = %raw, error = %e, "Ignoring invalid override"),
    }
}

/// Subscriber stream listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8090)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8090,
        }
    }
}

/// Admin server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address (localhost only by default)
    pub host: IpAddr,
    /// Port (default: 8091)
    pub port: u16,
    /// Enable admin server
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8091,
            enabled: true,
        }
    }
}

/// New-connection rate limiting per origin IP
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Sustained new connections per second per IP
    pub connections_per_second: u32,
    /// Burst allowance (token bucket)
    pub burst_size: u32,
    /// IPs exempt from rate limiting
    pub whitelist: Vec<IpAddr>,
    /// How often stale buckets are pruned
    #[serde(with = "duration_serde")]
    pub cleanup_interval: Duration,
    /// Idle time after which a bucket is pruned
    #[serde(with = "duration_serde")]
    pub bucket_max_age: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            connections_per_second: 10,
            burst_size: 20,
            whitelist: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            cleanup_interval: Duration::from_secs(60),
            bucket_max_age: Duration::from_secs(300),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins ("*" echoes any origin)
    pub allowed_origins: Vec<String>,
    /// Allowed request headers
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache, in seconds
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Last-Event-ID".to_string(),
                "Cache-Control".to_string(),
            ],
            max_age: 86400, // 24 hours
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Stream and admin listeners on the same address
    #[error("stream and admin listeners share address {0}")]
    DuplicateAddress(SocketAddr),
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
}
