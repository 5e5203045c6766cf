//! Prometheus metrics for the event broker.
//!
//! All metrics follow the naming convention: `broker_<area>_<metric>[_total]`
//!
//! Backpressure drops are never errors; these counters are where they become
//! visible to operators.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Crate-local metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT FLOW
    // =========================================================================

    /// Events accepted into the publish queue
    pub static ref EVENTS_PUBLISHED: IntCounter = IntCounter::new(
        "broker_events_published_total",
        "Events accepted into the broker publish queue"
    ).expect("metric creation failed");

    /// Backpressure drops by layer
    pub static ref EVENTS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_events_dropped_total", "Events dropped by backpressure"),
        &["layer"]  // layer: global/client
    ).expect("metric creation failed");

    /// Successful per-client enqueues
    pub static ref EVENTS_DELIVERED: IntCounter = IntCounter::new(
        "broker_events_delivered_total",
        "Events enqueued to subscriber queues"
    ).expect("metric creation failed");

    /// Heartbeat ticks fanned out
    pub static ref HEARTBEATS_SENT: IntCounter = IntCounter::new(
        "broker_heartbeats_sent_total",
        "Heartbeat ticks broadcast to subscribers"
    ).expect("metric creation failed");

    // =========================================================================
    // CLIENTS
    // =========================================================================

    /// Current registry size
    pub static ref CLIENTS_CONNECTED: IntGauge = IntGauge::new(
        "broker_clients_connected",
        "Number of currently registered subscribers"
    ).expect("metric creation failed");

    /// Rejected subscriber connections
    pub static ref CLIENTS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("broker_clients_rejected_total", "Rejected subscriber connections"),
        &["reason"]  // reason: capacity/not_running/duplicate/rate_limited
    ).expect("metric creation failed");

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Events currently retained for replay
    pub static ref HISTORY_SIZE: IntGauge = IntGauge::new(
        "broker_history_size",
        "Events currently retained in the replay window"
    ).expect("metric creation failed");
}

/// Register all metrics with the crate registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(EVENTS_DROPPED.clone()),
        Box::new(EVENTS_DELIVERED.clone()),
        Box::new(HEARTBEATS_SENT.clone()),
        Box::new(CLIENTS_CONNECTED.clone()),
        Box::new(CLIENTS_REJECTED.clone()),
        Box::new(HISTORY_SIZE.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Encode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Encode(e.to_string()))
}
