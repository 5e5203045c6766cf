//! # Events
//!
//! The unit of distribution. Produced upstream (or synthesized by the
//! broker), routed by dot-namespaced `type`, filtered by `type` and `source`.

use crate::filter::SubscriptionFilter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form event payload.
pub type EventData = serde_json::Map<String, Value>;

/// Source used for events the broker synthesizes itself.
pub const BROKER_SOURCE: &str = "broker";

/// Type of the periodic liveness event.
pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// Type of the greeting written to a freshly bound connection.
pub const CONNECTION_ESTABLISHED_TYPE: &str = "connection.established";

/// An immutable, typed, timestamped fact produced by an upstream service.
///
/// Serialized as `{"id","type","source","timestamp","data"}`; this is the
/// JSON carried in the `data:` line of every pushed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique per event as produced upstream (or synthesized).
    pub id: String,
    /// Dot-namespaced type, e.g. `blog.post.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Producing service.
    pub source: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    #[serde(default)]
    pub data: EventData,
}

impl Event {
    /// Create an event with a synthesized id and the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, data: EventData) -> Self {
        Self {
            id: crate::new_id(),
            event_type: event_type.into(),
            source: source.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Replace the synthesized id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Periodic liveness event. Never stored in history.
    #[must_use]
    pub fn heartbeat() -> Self {
        let now = Utc::now();
        let mut data = EventData::new();
        data.insert("timestamp".to_string(), Value::String(now.to_rfc3339()));
        Self::new(HEARTBEAT_TYPE, BROKER_SOURCE, data).with_timestamp(now)
    }

    /// Greeting written directly to a connection once it is bound to a client.
    #[must_use]
    pub fn connection_established(client_id: &str) -> Self {
        let mut data = EventData::new();
        data.insert(
            "client_id".to_string(),
            Value::String(client_id.to_string()),
        );
        Self::new(CONNECTION_ESTABLISHED_TYPE, BROKER_SOURCE, data)
    }

    /// Check this event against a subscription filter.
    #[must_use]
    pub fn matches_filter(&self, filter: &SubscriptionFilter) -> bool {
        filter.matches(self)
    }

    /// Whether this is a broker heartbeat.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.event_type == HEARTBEAT_TYPE && self.source == BROKER_SOURCE
    }
}
