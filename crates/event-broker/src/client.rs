//! # Client
//!
//! Per-connection delivery unit: identity, filter, bounded outbound queue
//! and delivery counters. Transport independent.
//!
//! The broker holds the [`Client`] (producer side); the connection handler
//! holds the matching [`ClientQueue`] (consumer side).

use broker_telemetry::{EVENTS_DELIVERED, EVENTS_DROPPED};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use shared_types::{ClientMetadata, Event, SubscriptionFilter};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Point-in-time view of one client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub id: String,
    pub connected_at: DateTime<Utc>,
    pub delivered: u64,
    pub dropped: u64,
    pub metadata: ClientMetadata,
    pub filter: SubscriptionFilter,
}

/// Producer side of one subscriber connection.
pub struct Client {
    id: String,
    filter: SubscriptionFilter,
    connected_at: DateTime<Utc>,
    metadata: ClientMetadata,
    /// `None` once closed.
    sender: Mutex<Option<mpsc::Sender<Arc<Event>>>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Client {
    /// Create a client and the queue its connection reads from.
    pub fn new(
        id: impl Into<String>,
        filter: SubscriptionFilter,
        queue_capacity: usize,
        metadata: ClientMetadata,
    ) -> (Self, ClientQueue) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let client = Self {
            id: id.into(),
            filter,
            connected_at: Utc::now(),
            metadata,
            sender: Mutex::new(Some(sender)),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (client, ClientQueue { receiver })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    #[must_use]
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    #[must_use]
    pub fn metadata(&self) -> &ClientMetadata {
        &self.metadata
    }

    /// Whether `event` passes this client's filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        event.matches_filter(&self.filter)
    }

    /// Non-blocking enqueue.
    ///
    /// Returns `false` if the queue is full (the event is dropped for this
    /// client only and counted), or if the client is closed.
    pub fn send_event(&self, event: Arc<Event>) -> bool {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                EVENTS_DELIVERED.inc();
                true
            }
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                EVENTS_DROPPED.with_label_values(&["client"]).inc();
                warn!(
                    client_id = %self.id,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    dropped,
                    "Client queue full, event dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client_id = %self.id, "Client queue receiver gone");
                false
            }
        }
    }

    /// Close the outbound queue. The reader drains what is already queued
    /// and then sees end of stream. Idempotent.
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            debug!(client_id = %self.id, "Client closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            id: self.id.clone(),
            connected_at: self.connected_at,
            delivered: self.delivered_count(),
            dropped: self.dropped_count(),
            metadata: self.metadata.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Consumer side of a client's outbound queue.
///
/// Implements `Stream`, ending once the client is closed and drained.
pub struct ClientQueue {
    receiver: mpsc::Receiver<Arc<Event>>,
}

impl ClientQueue {
    /// Wait for the next event. `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for ClientQueue {
    type Item = Arc<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
