//! Broker configuration.
//!
//! Supplied at construction time; there is no hot reload.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one [`crate::Broker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Maximum concurrently registered clients.
    pub max_clients: usize,
    /// Heartbeat period. Zero disables heartbeats.
    #[serde(with = "shared_types::duration_serde")]
    pub heartbeat_interval: Duration,
    /// Events retained for reconnection replay. Zero disables history.
    pub history_capacity: usize,
    /// Per-client outbound queue capacity.
    pub client_queue_capacity: usize,
    /// Internal publish queue capacity.
    pub publish_queue_capacity: usize,
    /// How long `stop()` waits for the dispatch task before aborting it.
    #[serde(with = "shared_types::duration_serde")]
    pub shutdown_grace: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_clients: 1000,
            heartbeat_interval: Duration::from_secs(30),
            history_capacity: 100,
            client_queue_capacity: 100,
            publish_queue_capacity: 1000,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl BrokerConfig {
    /// Defaults with the three primary knobs overridden.
    #[must_use]
    pub fn new(max_clients: usize, heartbeat_interval: Duration, history_capacity: usize) -> Self {
        Self {
            max_clients,
            heartbeat_interval,
            history_capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_client_queue_capacity(mut self, capacity: usize) -> Self {
        self.client_queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_publish_queue_capacity(mut self, capacity: usize) -> Self {
        self.publish_queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Heartbeat period, or `None` when heartbeats are disabled.
    #[must_use]
    pub fn heartbeat_period(&self) -> Option<Duration> {
        (!self.heartbeat_interval.is_zero()).then_some(self.heartbeat_interval)
    }
}
