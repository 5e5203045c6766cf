//! # Broker Runtime
//!
//! Wires the push gateway to an in-process ingestion channel.
//!
//! ## Startup Sequence
//!
//! 1. Initialise telemetry (logging + metrics registry)
//! 2. Load configuration from `BROKER_*` environment variables
//! 3. Start the broker and both HTTP listeners
//! 4. Start the ingestion task
//! 5. Wait for Ctrl-C, then shut down in reverse order
//!
//! Producers embedded in the same process publish through
//! [`BrokerRuntime::ingest_sender`]; remote producers use
//! `POST /api/v1/events` on the admin listener.

use anyhow::{Context, Result};
use event_broker::Broker;
use push_gateway::{
    run_ingest, BoundAddrs, ChannelIngestSource, GatewayConfig, IngestMessage, PushGatewayService,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Buffered platform messages before producers see backpressure.
pub const INGEST_CHANNEL_CAPACITY: usize = 1024;

/// Top-level process state
pub struct BrokerRuntime {
    service: PushGatewayService,
    ingest_tx: mpsc::Sender<IngestMessage>,
    /// Taken when ingestion starts.
    ingest_source: Option<ChannelIngestSource>,
    ingest_task: Option<JoinHandle<u64>>,
    shutdown_tx: watch::Sender<bool>,
}

impl BrokerRuntime {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let service = PushGatewayService::new(config).context("invalid gateway configuration")?;
        let (ingest_source, ingest_tx) = ChannelIngestSource::new(INGEST_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            service,
            ingest_tx,
            ingest_source: Some(ingest_source),
            ingest_task: None,
            shutdown_tx,
        })
    }

    /// Sender for in-process producers.
    pub fn ingest_sender(&self) -> mpsc::Sender<IngestMessage> {
        self.ingest_tx.clone()
    }

    pub fn broker(&self) -> Arc<Broker> {
        self.service.broker()
    }

    /// Start serving, then start ingestion.
    pub async fn start(&mut self) -> Result<BoundAddrs> {
        let source = self
            .ingest_source
            .take()
            .context("runtime already started")?;

        let addrs = self
            .service
            .start()
            .await
            .context("failed to start push gateway")?;

        self.ingest_task = Some(tokio::spawn(run_ingest(
            source,
            self.service.broker(),
            self.shutdown_tx.subscribe(),
        )));

        info!(
            stream = %addrs.http,
            admin = ?addrs.admin,
            "Broker runtime started"
        );
        Ok(addrs)
    }

    /// Stop ingestion first so nothing is published into a stopping broker.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.ingest_task.take() {
            match task.await {
                Ok(published) => info!(published, "Ingestion task finished"),
                Err(e) => warn!(error = %e, "Ingestion task failed"),
            }
        }

        self.service.shutdown().await;
        info!("Broker runtime stopped");
    }
}
