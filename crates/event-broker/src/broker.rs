//! # Broker
//!
//! Owns the client registry and the single dispatch task.
//!
//! ## Dispatch
//!
//! `publish_event` never blocks: it `try_send`s onto a bounded publish queue
//! and drops the event (logged, counted) when the queue is full. The dispatch
//! task drains that queue in order, appends each event to history and then
//! offers it to every client whose filter matches. Heartbeats are produced on
//! the same task but skip both the publish queue and history.
//!
//! ## Registry
//!
//! One `RwLock` guards the registry. Registration and unregistration take the
//! write lock; dispatch, heartbeats and every query take the read lock. Client
//! sends are non-blocking, so the read lock is never held across a wait.
//!
//! ## Lifecycle
//!
//! ```text
//! Created --start()--> Running --stop()--> Stopping --> Stopped
//! ```
//!
//! Registration and publication are only accepted while `Running`.

use crate::client::{Client, ClientStats};
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::history::EventHistory;
use broker_telemetry::{
    CLIENTS_CONNECTED, CLIENTS_REJECTED, EVENTS_DROPPED, EVENTS_PUBLISHED, HEARTBEATS_SENT,
    HISTORY_SIZE,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use shared_types::Event;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Broker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BrokerState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl BrokerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only broker snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerStats {
    pub state: BrokerState,
    pub total_clients: usize,
    pub max_clients: usize,
    pub clients: Vec<ClientStats>,
    pub history_size: usize,
    pub history_capacity: usize,
    pub events_published: u64,
    pub events_dropped: u64,
    pub uptime_secs: u64,
}

/// Central registry and dispatcher.
pub struct Broker {
    config: BrokerConfig,
    state: AtomicU8,
    clients: RwLock<HashMap<String, Arc<Client>>>,
    history: EventHistory,

    publish_tx: mpsc::Sender<Arc<Event>>,
    /// Taken by the dispatch task on start.
    publish_rx: Mutex<Option<mpsc::Receiver<Arc<Event>>>>,
    shutdown_tx: watch::Sender<bool>,
    dispatch: Mutex<Option<JoinHandle<()>>>,

    events_published: AtomicU64,
    events_dropped: AtomicU64,
    started_at: Mutex<Option<Instant>>,
}

impl Broker {
    /// Create a broker in the `Created` state.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Arc<Self> {
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_queue_capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            history: EventHistory::new(config.history_capacity),
            config,
            state: AtomicU8::new(BrokerState::Created as u8),
            clients: RwLock::new(HashMap::new()),
            publish_tx,
            publish_rx: Mutex::new(Some(publish_rx)),
            shutdown_tx,
            dispatch: Mutex::new(None),
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            started_at: Mutex::new(None),
        })
    }

    /// Launch the dispatch task. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), BrokerError> {
        self.state
            .compare_exchange(
                BrokerState::Created as u8,
                BrokerState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| BrokerError::AlreadyStarted)?;

        let publish_rx = self
            .publish_rx
            .lock()
            .take()
            .ok_or(BrokerError::AlreadyStarted)?;
        let shutdown_rx = self.shutdown_tx.subscribe();

        *self.started_at.lock() = Some(Instant::now());
        let handle = tokio::spawn(Arc::clone(self).run_dispatch(publish_rx, shutdown_rx));
        *self.dispatch.lock() = Some(handle);

        info!(
            max_clients = self.config.max_clients,
            heartbeat_interval = ?self.config.heartbeat_period(),
            history_capacity = self.config.history_capacity,
            "Broker started"
        );
        Ok(())
    }

    /// Stop dispatching, then close and forget every client.
    ///
    /// The dispatch task gets `shutdown_grace` to finish queued work before
    /// it is aborted. Calling this again is a no-op.
    pub async fn stop(&self) {
        match self.state.compare_exchange(
            BrokerState::Running as u8,
            BrokerState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(current) if current == BrokerState::Created as u8 => {
                self.state
                    .store(BrokerState::Stopped as u8, Ordering::Release);
                debug!("Broker stopped before start");
                return;
            }
            Err(_) => {
                debug!("Broker stop called again, ignoring");
                return;
            }
        }

        info!("Broker stopping");
        let _ = self.shutdown_tx.send(true);

        let handle = self.dispatch.lock().take();
        if let Some(mut handle) = handle {
            match time::timeout(self.config.shutdown_grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Dispatch task ended abnormally"),
                Err(_) => {
                    warn!(
                        grace = ?self.config.shutdown_grace,
                        "Dispatch task exceeded shutdown grace, aborting"
                    );
                    handle.abort();
                }
            }
        }

        let clients: Vec<Arc<Client>> = {
            let mut registry = self.clients.write();
            registry.drain().map(|(_, client)| client).collect()
        };
        for client in &clients {
            client.close();
        }
        CLIENTS_CONNECTED.set(0);

        self.state
            .store(BrokerState::Stopped as u8, Ordering::Release);
        info!(closed_clients = clients.len(), "Broker stopped");
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Admit a client.
    ///
    /// On rejection (registry full, id already taken, or broker not running)
    /// the client is closed immediately and never added.
    pub fn register_client(&self, client: Arc<Client>) -> Result<(), BrokerError> {
        let mut registry = self.clients.write();

        // Checked under the lock so a concurrent stop() cannot miss this client.
        if self.state() != BrokerState::Running {
            drop(registry);
            client.close();
            CLIENTS_REJECTED.with_label_values(&["not_running"]).inc();
            warn!(client_id = %client.id(), "Client rejected, broker not running");
            return Err(BrokerError::NotRunning);
        }

        if registry.len() >= self.config.max_clients {
            let max = self.config.max_clients;
            drop(registry);
            client.close();
            CLIENTS_REJECTED.with_label_values(&["capacity"]).inc();
            warn!(client_id = %client.id(), max_clients = max, "Client rejected, limit reached");
            return Err(BrokerError::ClientLimitReached { max });
        }

        if registry.contains_key(client.id()) {
            drop(registry);
            let id = client.id().to_string();
            client.close();
            CLIENTS_REJECTED.with_label_values(&["duplicate"]).inc();
            warn!(client_id = %id, "Client rejected, id already registered");
            return Err(BrokerError::DuplicateClient { id });
        }

        let id = client.id().to_string();
        registry.insert(id.clone(), client);
        let count = registry.len();
        drop(registry);

        CLIENTS_CONNECTED.set(count as i64);
        info!(client_id = %id, clients = count, "Client registered");
        Ok(())
    }

    /// Remove and close a client. Unknown ids are a no-op.
    ///
    /// Returns whether a client was removed.
    pub fn unregister_client(&self, id: &str) -> bool {
        let (removed, count) = {
            let mut registry = self.clients.write();
            let removed = registry.remove(id);
            (removed, registry.len())
        };

        let Some(client) = removed else {
            debug!(client_id = %id, "Unregister for unknown client ignored");
            return false;
        };

        client.close();
        CLIENTS_CONNECTED.set(count as i64);
        info!(
            client_id = %id,
            clients = count,
            delivered = client.delivered_count(),
            dropped = client.dropped_count(),
            "Client unregistered"
        );
        true
    }

    // =========================================================================
    // Publication
    // =========================================================================

    /// Queue an event for dispatch. Fire and forget.
    ///
    /// If the publish queue is full the event is dropped entirely: it reaches
    /// neither history nor any client.
    pub fn publish_event(&self, event: Event) {
        if self.state() != BrokerState::Running {
            debug!(event_id = %event.id, state = %self.state(), "Broker not running, event dropped");
            return;
        }

        match self.publish_tx.try_send(Arc::new(event)) {
            Ok(()) => {
                self.events_published.fetch_add(1, Ordering::Relaxed);
                EVENTS_PUBLISHED.inc();
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.events_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                EVENTS_DROPPED.with_label_values(&["global"]).inc();
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    dropped,
                    "Publish queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(event_id = %event.id, "Dispatch task gone, event dropped");
            }
        }
    }

    async fn run_dispatch(
        self: Arc<Self>,
        mut publish_rx: mpsc::Receiver<Arc<Event>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut heartbeat = self.config.heartbeat_period().map(|period| {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        debug!("Dispatch task running");
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                // Ahead of publication so a busy publish queue cannot starve it.
                _ = next_tick(&mut heartbeat) => self.broadcast_heartbeat(),

                Some(event) = publish_rx.recv() => self.dispatch_event(event),
            }
        }

        // Finish whatever was already accepted before the shutdown signal.
        let mut drained = 0usize;
        while let Ok(event) = publish_rx.try_recv() {
            self.dispatch_event(event);
            drained += 1;
        }
        debug!(drained, "Dispatch task exiting");
    }

    fn dispatch_event(&self, event: Arc<Event>) {
        self.history.add(Arc::clone(&event));
        HISTORY_SIZE.set(self.history.size() as i64);

        let mut delivered = 0usize;
        let mut dropped = 0usize;
        {
            let registry = self.clients.read();
            for client in registry.values().filter(|c| c.matches(&event)) {
                if client.send_event(Arc::clone(&event)) {
                    delivered += 1;
                } else {
                    dropped += 1;
                }
            }
        }

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            source = %event.source,
            delivered,
            dropped,
            "Event dispatched"
        );
    }

    fn broadcast_heartbeat(&self) {
        let heartbeat = Arc::new(Event::heartbeat());
        let registry = self.clients.read();
        let mut delivered = 0usize;
        for client in registry.values() {
            if client.send_event(Arc::clone(&heartbeat)) {
                delivered += 1;
            }
        }
        HEARTBEATS_SENT.inc();
        debug!(clients = registry.len(), delivered, "Heartbeat sent");
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> BrokerState {
        BrokerState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.clients.read().contains_key(id)
    }

    /// All retained events, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Arc<Event>> {
        self.history.get_all()
    }

    /// Retained events strictly after `last_event_id`; see [`EventHistory::get_since`].
    #[must_use]
    pub fn history_since(&self, last_event_id: &str) -> Vec<Arc<Event>> {
        self.history.get_since(last_event_id)
    }

    /// Per-client stats ordered by connect time, then id.
    #[must_use]
    pub fn client_stats(&self, limit: usize, offset: usize) -> Vec<ClientStats> {
        self.all_client_stats()
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        let clients = self.all_client_stats();
        let uptime_secs = self
            .started_at
            .lock()
            .map(|started| started.elapsed().as_secs())
            .unwrap_or(0);

        BrokerStats {
            state: self.state(),
            total_clients: clients.len(),
            max_clients: self.config.max_clients,
            clients,
            history_size: self.history.size(),
            history_capacity: self.history.capacity(),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            uptime_secs,
        }
    }

    fn all_client_stats(&self) -> Vec<ClientStats> {
        let mut stats: Vec<ClientStats> = self
            .clients
            .read()
            .values()
            .map(|client| client.stats())
            .collect();
        stats.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        stats
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("state", &self.state())
            .field("clients", &self.client_count())
            .field("history_size", &self.history.size())
            .finish_non_exhaustive()
    }
}

/// Next heartbeat tick, or never when heartbeats are disabled.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
