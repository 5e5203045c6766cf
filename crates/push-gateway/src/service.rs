//! Push gateway service: owns the broker and both HTTP listeners.
//!
//! `start()` starts the broker, binds the listeners and returns once they
//! accept connections. `shutdown()` stops accepting, stops the broker (which
//! ends every subscriber stream so graceful shutdown can complete), then
//! waits for the servers to drain.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::{cleanup_task, RateLimitLayer};
use crate::router::{admin_router, stream_router, AppState};
use event_broker::Broker;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

type ServerHandle = JoinHandle<std::io::Result<()>>;

/// Addresses the listeners actually bound (resolves port 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub http: SocketAddr,
    pub admin: Option<SocketAddr>,
}

struct Running {
    addrs: BoundAddrs,
    stop_tx: watch::Sender<bool>,
    /// `None` once `run_until` has observed it exit.
    http: Option<ServerHandle>,
    admin: Option<ServerHandle>,
    cleanup: JoinHandle<()>,
}

/// Push gateway service state
pub struct PushGatewayService {
    config: GatewayConfig,
    broker: Arc<Broker>,
    running: Option<Running>,
}

impl PushGatewayService {
    /// Validate `config` and build the (not yet started) broker.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let broker = Broker::new(config.broker.clone());

        Ok(Self {
            config,
            broker,
            running: None,
        })
    }

    /// Shared broker, for wiring ingestion.
    pub fn broker(&self) -> Arc<Broker> {
        Arc::clone(&self.broker)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Bound addresses while running.
    pub fn local_addrs(&self) -> Option<BoundAddrs> {
        self.running.as_ref().map(|r| r.addrs)
    }

    /// Start the broker and both servers.
    pub async fn start(&mut self) -> Result<BoundAddrs, GatewayError> {
        if self.running.is_some() {
            return Err(GatewayError::Internal("service already started".into()));
        }
        info!("Starting push gateway...");

        // Bind first so a taken port leaves the broker untouched.
        let http_listener = bind(self.config.http_addr()).await?;
        let admin_listener = if self.config.admin.enabled {
            Some(bind(self.config.admin_addr()).await?)
        } else {
            None
        };
        let addrs = BoundAddrs {
            http: local_addr(&http_listener)?,
            admin: admin_listener.as_ref().map(local_addr).transpose()?,
        };

        self.broker.start()?;

        let rate_limit = RateLimitLayer::new(self.config.rate_limit.clone());
        let cleanup = tokio::spawn(cleanup_task(
            rate_limit.state(),
            self.config.rate_limit.cleanup_interval,
            self.config.rate_limit.bucket_max_age,
        ));

        let state = AppState::new(Arc::clone(&self.broker));
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(addr = %addrs.http, "Starting stream server");
        let router = stream_router(state.clone(), &self.config.cors, rate_limit);
        let http = tokio::spawn({
            let stop_rx = stop_rx.clone();
            async move {
                axum::serve(
                    http_listener,
                    router.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(wait_for_stop(stop_rx))
                .await
            }
        });

        let admin = admin_listener.map(|listener| {
            info!(addr = ?addrs.admin, "Starting admin server");
            let router = admin_router(state);
            tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(wait_for_stop(stop_rx))
                    .await
            })
        });

        self.running = Some(Running {
            addrs,
            stop_tx,
            http: Some(http),
            admin,
            cleanup,
        });

        info!("Push gateway started successfully");
        Ok(addrs)
    }

    /// Trigger graceful shutdown and wait for it. No-op if not running.
    pub async fn shutdown(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        info!("Push gateway stopping");

        let _ = running.stop_tx.send(true);
        self.broker.stop().await;
        running.cleanup.abort();

        if let Some(http) = running.http {
            join_server("stream", http).await;
        }
        if let Some(admin) = running.admin {
            join_server("admin", admin).await;
        }

        info!("Push gateway stopped");
    }

    /// Start, serve until `signal` resolves or the stream server dies, then
    /// shut down.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send,
    {
        self.start().await?;

        let outcome = match self.running.as_mut() {
            Some(Running { http: Some(http), .. }) => {
                let result = tokio::select! {
                    _ = signal => {
                        info!("Received shutdown signal");
                        None
                    }
                    result = http => Some(result),
                };
                match result {
                    None => Ok(()),
                    Some(result) => {
                        warn!("Stream server exited unexpectedly");
                        if let Some(running) = self.running.as_mut() {
                            running.http = None;
                        }
                        match result {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(e)) => Err(GatewayError::Internal(e.to_string())),
                            Err(e) => Err(GatewayError::Internal(e.to_string())),
                        }
                    }
                }
            }
            _ => Err(GatewayError::ShuttingDown),
        };

        self.shutdown().await;
        outcome
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))
}

fn local_addr(listener: &TcpListener) -> Result<SocketAddr, GatewayError> {
    listener
        .local_addr()
        .map_err(|e| GatewayError::Bind(e.to_string()))
}

async fn wait_for_stop(mut stop_rx: watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn join_server(name: &'static str, handle: ServerHandle) {
    match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(server = name, error = %e, "Server error"),
        Err(e) => error!(server = name, error = %e, "Server task failed"),
    }
}
