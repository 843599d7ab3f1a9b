//! Order Fulfillment Binary
//!
//! Starts the paid order fulfillment loop.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-fulfillment
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `STORE_URL`: Base URL of the order store (PostgREST)
//! - `STORE_API_KEY`: Store API key
//! - `HOST_MODE`: rcon | dry-run (dry-run acknowledges orders without running them)
//! - `RCON_PASSWORD`: RCON password (only when `HOST_MODE=rcon`)
//!
//! ## Optional
//! - `STORE_ORDERS_TABLE`: Orders table (default: orders)
//! - `STORE_HTTP_TIMEOUT_SECS`: Store request timeout (default: 10)
//! - `POLL_INTERVAL_SECS`: Seconds between fetch cycles (default: 15)
//! - `RCON_ADDRESS`: RCON host:port (default: 127.0.0.1:25575)
//! - `HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry span export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: order-fulfillment)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use order_fulfillment::infrastructure::health::{HealthServer, HealthServerState};
use order_fulfillment::infrastructure::telemetry;
use order_fulfillment::{
    DeliveryTracker, DryRunHost, FulfillmentConfig, FulfillmentLoop, HostExecutor, HostMode,
    InMemoryDeliveryTracker, RconConfig, RconError, RconHost, StoreClient, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP export)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Order Fulfillment");

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Metrics recorder unavailable");
    }

    let config = FulfillmentConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Order store adapter, used as both source and sink
    let store = Arc::new(StoreClient::new(&config.store.client_config())?);

    // Host execution context
    let executor = match config.host.mode {
        HostMode::Rcon => {
            let rcon = config
                .host
                .rcon_config()
                .ok_or("RCON_PASSWORD is required in rcon mode")?;
            HostExecutor::spawn(open_rcon(rcon).await?)?
        }
        HostMode::DryRun => HostExecutor::spawn(DryRunHost::new())?,
    };
    let executor = Arc::new(executor);

    let tracker: Arc<dyn DeliveryTracker> = Arc::new(InMemoryDeliveryTracker::new());
    let fulfillment = FulfillmentLoop::new(
        config.loop_config(),
        Arc::clone(&store),
        store,
        Arc::clone(&executor),
        Arc::clone(&tracker),
    );

    // Spawn health server
    if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
    } else {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            fulfillment.stats(),
            tracker,
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    tracing::info!("Order fulfillment ready");

    fulfillment.run(shutdown_token).await;

    // Let dispatched orders finish their acknowledgment
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, fulfillment.drain())
        .await
        .is_err()
    {
        tracing::warn!(
            in_flight = fulfillment.in_flight(),
            "Shutdown timeout elapsed with acknowledgments still pending"
        );
    }
    drop(fulfillment);

    match Arc::try_unwrap(executor) {
        Ok(executor) => executor.shutdown().await,
        Err(_) => tracing::warn!("Host executor still shared, skipping host thread join"),
    }

    tracing::info!("Order fulfillment stopped");
    Ok(())
}

/// Open the RCON session before the loop starts.
///
/// A rejected password is fatal. An unreachable server is not: the host
/// reconnects on the first dispatch.
async fn open_rcon(config: RconConfig) -> Result<RconHost, Box<dyn std::error::Error>> {
    let (host, preflight) = tokio::task::spawn_blocking(move || {
        let mut host = RconHost::new(config);
        let preflight = host.preflight();
        (host, preflight)
    })
    .await?;

    match preflight {
        Ok(()) => Ok(host),
        Err(e @ RconError::AuthenticationFailed) => Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Rcon unreachable at startup, retrying on first dispatch");
            Ok(host)
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FulfillmentConfig) {
    tracing::info!(
        store_url = %config.store.url,
        table = %config.store.table,
        poll_interval_secs = config.poll_interval.as_secs(),
        host_mode = config.host.mode.as_str(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    for warning in config.warnings() {
        tracing::warn!(%warning, "Configuration warning");
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
