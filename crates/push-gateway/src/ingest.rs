//! # Ingestion Boundary
//!
//! Translates loosely typed platform messages into [`Event`]s and feeds them
//! to [`Broker::publish_event`].
//!
//! Upstream services do not agree on field names, so translation is
//! forgiving:
//!
//! | Event field | Accepted message fields                          |
//! |-------------|--------------------------------------------------|
//! | `type`      | `type`, `event_type`, `routing_key` (required)   |
//! | `source`    | `source`, `service` (default `"unknown"`)        |
//! | `data`      | `data`, `payload` (non-objects wrapped as `value`) |
//! | `id`        | `id`, else payload `id`/`event_id`/`message_id`/`uuid`, else generated |
//! | `timestamp` | `timestamp`, else payload `timestamp`/`created_at`/`occurred_at`/`time`, else now |
//!
//! Timestamps may be RFC 3339 strings or unix seconds / milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_broker::Broker;
use serde::Deserialize;
use serde_json::Value;
use shared_types::{new_id, Event, EventData};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const ID_FIELDS: [&str; 4] = ["id", "event_id", "message_id", "uuid"];
const TIMESTAMP_FIELDS: [&str; 4] = ["timestamp", "created_at", "occurred_at", "time"];
const DEFAULT_SOURCE: &str = "unknown";

/// Above this a numeric timestamp is read as milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;

/// A platform message as received from upstream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IngestMessage {
    #[serde(rename = "type", alias = "event_type", alias = "routing_key", default)]
    pub event_type: Option<String>,
    #[serde(alias = "service", default)]
    pub source: Option<String>,
    #[serde(alias = "payload", default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl IngestMessage {
    /// Minimal message with a type and an object payload.
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: Some(event_type.into()),
            source: Some(source.into()),
            data: Some(data),
            ..Self::default()
        }
    }
}

/// Single message or batch, as accepted over HTTP.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngestPayload {
    Batch(Vec<IngestMessage>),
    Single(IngestMessage),
}

impl IngestPayload {
    pub fn into_messages(self) -> Vec<IngestMessage> {
        match self {
            Self::Batch(messages) => messages,
            Self::Single(message) => vec![message],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("message has no event type")]
    MissingType,
}

/// Translate one platform message into an [`Event`].
pub fn translate(message: IngestMessage) -> Result<Event, IngestError> {
    let event_type = message
        .event_type
        .map(|t| wire_safe(&t))
        .filter(|t| !t.is_empty())
        .ok_or(IngestError::MissingType)?;

    let source = message
        .source
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let data = match message.data {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => EventData::new(),
        Some(other) => {
            let mut map = EventData::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    let id = message
        .id
        .as_ref()
        .and_then(id_from_value)
        .or_else(|| ID_FIELDS.iter().find_map(|f| data.get(*f).and_then(id_from_value)))
        .unwrap_or_else(new_id);

    let timestamp = message
        .timestamp
        .as_ref()
        .and_then(timestamp_from_value)
        .or_else(|| {
            TIMESTAMP_FIELDS
                .iter()
                .find_map(|f| data.get(*f).and_then(timestamp_from_value))
        })
        .unwrap_or_else(Utc::now);

    Ok(Event::new(event_type, source, data)
        .with_id(id)
        .with_timestamp(timestamp))
}

/// Ids and types travel on single SSE lines. Line breaks and NULs are
/// removed here so the stored value is exactly what subscribers see and
/// send back as `Last-Event-ID`.
fn wire_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\0'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(wire_safe(s)).filter(|id| !id.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => {
            let raw = n.as_f64()?;
            let millis = if raw.abs() >= MILLIS_THRESHOLD {
                raw
            } else {
                raw * 1000.0
            };
            DateTime::from_timestamp_millis(millis as i64)
        }
        _ => None,
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Anything that yields platform messages (queue consumer, channel, ...).
#[async_trait]
pub trait IngestSource: Send {
    /// Next message, or `None` once the source is exhausted.
    async fn next_message(&mut self) -> Option<IngestMessage>;
}

/// In-process source fed through a bounded channel.
pub struct ChannelIngestSource {
    receiver: mpsc::Receiver<IngestMessage>,
}

impl ChannelIngestSource {
    /// Create the source and the sender producers publish through.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<IngestMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { receiver }, sender)
    }
}

#[async_trait]
impl IngestSource for ChannelIngestSource {
    async fn next_message(&mut self) -> Option<IngestMessage> {
        self.receiver.recv().await
    }
}

/// Pump `source` into `broker` until the source ends or `shutdown` flips.
///
/// Returns the number of events published.
pub async fn run_ingest<S>(
    mut source: S,
    broker: Arc<Broker>,
    mut shutdown: watch::Receiver<bool>,
) -> u64
where
    S: IngestSource,
{
    let mut published = 0u64;
    info!("Ingestion started");

    loop {
        let message = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            message = source.next_message() => message,
        };

        let Some(message) = message else {
            debug!("Ingestion source exhausted");
            break;
        };

        match translate(message) {
            Ok(event) => {
                debug!(event_id = %event.id, event_type = %event.event_type, "Ingested event");
                broker.publish_event(event);
                published += 1;
            }
            Err(e) => warn!(error = %e, "Dropping untranslatable message"),
        }
    }

    info!(published, "Ingestion stopped");
    published
}
