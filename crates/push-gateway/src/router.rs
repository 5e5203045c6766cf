//! Router assembly for the two listeners.
//!
//! - **Stream** (public): `GET /events`, `OPTIONS /events`, `GET /health`
//! - **Admin** (localhost): health, stats, clients, history, ingestion, metrics

use crate::admin;
use crate::domain::config::CorsConfig;
use crate::middleware::{create_cors_layer, RateLimitLayer, TracingLayer};
use crate::sse::{preflight, stream_events};
use axum::{
    routing::{delete, get, post},
    Router,
};
use event_broker::Broker;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
}

impl AppState {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

/// Subscriber-facing router. Rate limiting covers stream requests only.
pub fn stream_router(state: AppState, cors: &CorsConfig, rate_limit: RateLimitLayer) -> Router {
    Router::new()
        .route(
            "/events",
            get(stream_events)
                .route_layer(rate_limit)
                .options(preflight),
        )
        .route("/health", get(admin::health))
        .layer(TracingLayer::new())
        .layer(create_cors_layer(cors))
        .with_state(state)
}

/// Operator-facing router.
pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(admin::health))
        .route("/metrics", get(admin::metrics))
        .route("/api/v1/stats", get(admin::stats))
        .route("/api/v1/clients", get(admin::list_clients))
        .route("/api/v1/clients/:id", delete(admin::disconnect_client))
        .route("/api/v1/history", get(admin::history))
        .route("/api/v1/events", post(admin::ingest_events))
        .layer(TracingLayer::new())
        .with_state(state)
}
