//! Administrative surface.
//!
//! Served on the admin listener (localhost by default): health, broker
//! stats, client listing and forced disconnect, history inspection,
//! event ingestion over HTTP and Prometheus metrics.

use crate::domain::{ApiError, ApiResult};
use crate::ingest::{translate, IngestPayload};
use crate::router::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use event_broker::{BrokerState, BrokerStats};
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::Event;
use tracing::{info, warn};

/// Page size when `limit` is missing or not positive
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// `GET /health`
///
/// `200 {"status":"ok"}` while the broker is running, `503` with
/// `"degraded"` otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let broker = &state.broker;
    let broker_state = broker.state();
    let (status, label) = if broker_state == BrokerState::Running {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let stats = broker.stats();

    (
        status,
        Json(json!({
            "status": label,
            "state": broker_state,
            "clients": stats.total_clients,
            "max_clients": stats.max_clients,
            "history_size": stats.history_size,
            "uptime_secs": stats.uptime_secs,
        })),
    )
}

/// `GET /api/v1/stats`
pub async fn stats(State(state): State<AppState>) -> Json<BrokerStats> {
    Json(state.broker.stats())
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ClientsQuery {
    /// `(limit, offset)` with non-positive limits and negative offsets clamped.
    #[must_use]
    pub fn page(&self) -> (usize, usize) {
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        let offset = self
            .offset
            .and_then(|o| usize::try_from(o).ok())
            .unwrap_or(0);
        (limit, offset)
    }
}

/// `GET /api/v1/clients?limit=&offset=`
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ClientsQuery>,
) -> Json<Value> {
    let (limit, offset) = query.page();
    let clients = state.broker.client_stats(limit, offset);

    Json(json!({
        "total": state.broker.client_count(),
        "limit": limit,
        "offset": offset,
        "clients": clients,
    }))
}

/// `DELETE /api/v1/clients/:id`
pub async fn disconnect_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.broker.unregister_client(&id) {
        info!(client_id = %id, "Client disconnected by admin");
        Ok(Json(json!({ "disconnected": id })))
    } else {
        Err(ApiError::not_found(format!("Client {id} not found")))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub since: Option<String>,
}

/// `GET /api/v1/history?since=`
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let events = match query.since.as_deref().map(str::trim) {
        Some(since) if !since.is_empty() => state.broker.history_since(since),
        _ => state.broker.history(),
    };
    let events: Vec<&Event> = events.iter().map(|e| &**e).collect();

    Json(json!({
        "count": events.len(),
        "events": events,
    }))
}

/// `POST /api/v1/events`
///
/// Accepts one platform message or an array of them. The batch is
/// all-or-nothing: one untranslatable message rejects the request.
pub async fn ingest_events(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let payload: IngestPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON payload: {e}")))?;

    let events = payload
        .into_messages()
        .into_iter()
        .enumerate()
        .map(|(index, message)| {
            translate(message)
                .map_err(|e| ApiError::bad_request(format!("Message {index}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if state.broker.state() != BrokerState::Running {
        warn!(count = events.len(), "Ingest refused, broker not running");
        return Err(ApiError::service_unavailable("Broker is not running"));
    }

    let accepted = events.len();
    for event in events {
        state.broker.publish_event(event);
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))))
}

/// `GET /metrics`
pub async fn metrics() -> ApiResult<impl IntoResponse> {
    let body = broker_telemetry::gather_metrics()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
