//! Event broker executable.

use anyhow::{Context, Result};
use broker_runtime::BrokerRuntime;
use broker_telemetry::{init_telemetry, TelemetryConfig};
use push_gateway::GatewayConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("failed to initialise telemetry")?;

    let config = GatewayConfig::from_env();
    info!(
        stream = %config.http_addr(),
        admin = %config.admin_addr(),
        max_clients = config.broker.max_clients,
        "Configuration loaded"
    );

    let mut runtime = BrokerRuntime::new(config)?;
    runtime.start().await?;

    info!("Broker is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
