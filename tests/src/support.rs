//! Shared fixtures for integration scenarios.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use event_broker::{Broker, BrokerConfig};
use http_body_util::BodyExt;
use push_gateway::domain::{CorsConfig, RateLimitConfig};
use push_gateway::middleware::RateLimitLayer;
use push_gateway::{stream_router, AppState};
use serde_json::Value;
use shared_types::{Event, EventData};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::ServiceExt;

/// Upper bound for any single wait in a scenario.
pub const WAIT: Duration = Duration::from_secs(2);

/// One parsed SSE frame.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub id: String,
    pub event: String,
    pub data: Value,
}

impl SseFrame {
    pub fn parse(block: &str) -> Self {
        let mut frame = Self {
            id: String::new(),
            event: String::new(),
            data: Value::Null,
        };
        for line in block.lines() {
            if let Some(v) = line.strip_prefix("id:") {
                frame.id = v.trim_start().to_string();
            } else if let Some(v) = line.strip_prefix("event:") {
                frame.event = v.trim_start().to_string();
            } else if let Some(v) = line.strip_prefix("data:") {
                frame.data = serde_json::from_str(v.trim_start()).expect("data is JSON");
            }
        }
        frame
    }
}

/// Incremental frame reader over a streaming response body.
pub struct SseReader {
    body: Body,
    buffer: String,
}

impl SseReader {
    pub fn new(response: Response) -> Self {
        Self {
            body: response.into_body(),
            buffer: String::new(),
        }
    }

    pub async fn next(&mut self) -> SseFrame {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                return SseFrame::parse(&block);
            }
            let frame = timeout(WAIT, self.body.frame())
                .await
                .expect("timeout")
                .expect("stream ended")
                .expect("body error");
            if let Ok(bytes) = frame.into_data() {
                self.buffer
                    .push_str(std::str::from_utf8(&bytes).expect("utf-8"));
            }
        }
    }

    pub async fn next_n(&mut self, n: usize) -> Vec<SseFrame> {
        let mut frames = Vec::with_capacity(n);
        for _ in 0..n {
            frames.push(self.next().await);
        }
        frames
    }

    /// Wait for end of stream, returning any frames still buffered.
    pub async fn finish(mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                frames.push(SseFrame::parse(&block));
                continue;
            }
            match timeout(WAIT, self.body.frame()).await.expect("timeout") {
                None => return frames,
                Some(frame) => {
                    if let Ok(bytes) = frame.expect("body error").into_data() {
                        self.buffer
                            .push_str(std::str::from_utf8(&bytes).expect("utf-8"));
                    }
                }
            }
        }
    }
}

/// Started broker with heartbeats disabled.
pub fn start_broker(max_clients: usize, history_capacity: usize) -> Arc<Broker> {
    start_broker_with(BrokerConfig::new(
        max_clients,
        Duration::ZERO,
        history_capacity,
    ))
}

pub fn start_broker_with(config: BrokerConfig) -> Arc<Broker> {
    let broker = Broker::new(config);
    broker.start().expect("broker starts");
    broker
}

/// Stream router with default CORS and rate limiting.
pub fn stream_app(broker: &Arc<Broker>) -> Router {
    stream_router(
        AppState::new(Arc::clone(broker)),
        &CorsConfig::default(),
        RateLimitLayer::new(RateLimitConfig::default()),
    )
}

/// `GET uri` against `app`, optionally resuming from `last_event_id`.
pub async fn subscribe(app: &Router, uri: &str, last_event_id: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(id) = last_event_id {
        builder = builder.header("Last-Event-ID", id);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).expect("request"))
        .await
        .expect("infallible")
}

/// Subscribe and assert the stream opened.
pub async fn open_stream(app: &Router, uri: &str, last_event_id: Option<&str>) -> SseReader {
    let response = subscribe(app, uri, last_event_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    SseReader::new(response)
}

pub fn event(id: &str, event_type: &str, source: &str) -> Event {
    Event::new(event_type, source, EventData::new()).with_id(id)
}

/// Poll until the broker's history holds `size` events.
pub async fn wait_for_history(broker: &Broker, size: usize) {
    timeout(WAIT, async {
        while broker.history().len() < size {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timeout waiting for history");
}

/// Poll until `id` has been dispatched into history.
pub async fn wait_for_event(broker: &Broker, id: &str) {
    timeout(WAIT, async {
        while !broker.history().iter().any(|e| e.id == id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timeout waiting for event");
}

pub fn ids(frames: &[SseFrame]) -> Vec<&str> {
    frames.iter().map(|f| f.id.as_str()).collect()
}
