//! Server-Sent Events handler.
//!
//! One request becomes one [`Client`]. The response stream is, in order:
//!
//! 1. a `connection.established` greeting carrying the client id,
//! 2. the history replay (from `Last-Event-ID`, or the whole window),
//!    filtered by the subscription,
//! 3. live events from the client's queue until it is closed.
//!
//! Disconnects are noticed lazily: hyper drops the response body on its
//! next failed write, which drops the [`ConnectionGuard`] and unregisters
//! the client. Heartbeats bound how long a dead connection lingers.

use crate::domain::error::ApiError;
use crate::router::AppState;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{
        sse::{Event as SseEvent, Sse},
        IntoResponse, Response,
    },
};
use event_broker::{Broker, Client};
use futures::stream::BoxStream;
use serde::Deserialize;
use shared_types::{new_id, ClientMetadata, Event, SubscriptionFilter};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// Resume header sent by reconnecting `EventSource` clients
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Subscription query parameters
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    /// Comma-separated type patterns (`blog.post.created`, `blog.*`, `*`)
    pub event_types: Option<String>,
    /// Comma-separated source names
    pub sources: Option<String>,
}

/// `GET /events`
pub async fn stream_events(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, ApiError> {
    let broker = Arc::clone(&state.broker);
    let filter = SubscriptionFilter::parse(params.event_types.as_deref(), params.sources.as_deref());

    let last_event_id = headers
        .get(LAST_EVENT_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty());

    // Snapshot before registering: events dispatched in between can be
    // missed, but none is ever delivered twice.
    let history = match last_event_id {
        Some(id) => broker.history_since(id),
        None => broker.history(),
    };

    let metadata = ClientMetadata::new(
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        connect_info.map(|ConnectInfo(addr)| addr.to_string()),
    );

    let client_id = new_id();
    let (client, queue) = Client::new(
        client_id.clone(),
        filter.clone(),
        broker.config().client_queue_capacity,
        metadata,
    );

    if let Err(e) = broker.register_client(Arc::new(client)) {
        warn!(client_id = %client_id, error = %e, "Subscriber rejected");
        return Err(e.into());
    }

    let replay: Vec<Arc<Event>> = history
        .into_iter()
        .filter(|event| event.matches_filter(&filter))
        .collect();

    info!(
        client_id = %client_id,
        resume_from = last_event_id.unwrap_or(""),
        replay = replay.len(),
        "Subscriber connected"
    );

    let greeting = Event::connection_established(&client_id);
    let events = tokio_stream::once(Arc::new(greeting))
        .chain(tokio_stream::iter(replay))
        .chain(queue)
        .filter_map(|event| to_sse(&event))
        .map(Ok::<_, Infallible>);

    let stream = ClientStream {
        inner: Box::pin(events),
        _guard: ConnectionGuard {
            broker,
            client_id,
        },
    };

    Ok((
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(stream),
    )
        .into_response())
}

/// Bare `OPTIONS /events` without CORS preflight headers
pub async fn preflight() -> impl IntoResponse {
    axum::http::StatusCode::OK
}

/// Encode one event as an SSE frame: `id`, `event`, then JSON `data`.
///
/// Returns `None` (and logs) if the event cannot be serialized.
pub fn to_sse(event: &Event) -> Option<SseEvent> {
    match serde_json::to_string(event) {
        Ok(json) => Some(
            SseEvent::default()
                .id(sanitize_field(&event.id))
                .event(sanitize_field(&event.event_type))
                .data(json),
        ),
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "Failed to encode event");
            None
        }
    }
}

/// Strip characters that would break SSE framing.
fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\0'))
        .collect()
}

/// Unregisters the client exactly once, whenever the response body is dropped.
struct ConnectionGuard {
    broker: Arc<Broker>,
    client_id: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.broker.unregister_client(&self.client_id) {
            debug!(client_id = %self.client_id, "Subscriber stream dropped");
        }
    }
}

/// Response body stream tied to one registered client.
struct ClientStream {
    inner: BoxStream<'static, Result<SseEvent, Infallible>>,
    _guard: ConnectionGuard,
}

impl Stream for ClientStream {
    type Item = Result<SseEvent, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
