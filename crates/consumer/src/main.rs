//! Consumer entry point: reads inbound messages from stdin.
//!
//! Products live in an in-memory store for the life of the process, so the
//! stream registers batches on the `create_batch` channel before changing them.

use consumer::{Config, ConsumerError, LogFormat};
use storage::InMemoryProductStore;
use tokio::io::BufReader;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ConsumerError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| ConsumerError::Metrics(err.to_string()))?;

    // 3. Wire the message bus
    let store = InMemoryProductStore::new();
    let bus = service::bootstrap(store, consumer::collaborators(&config));

    // 4. Consume stdin until EOF or a signal
    tracing::info!(
        retry_max_attempts = config.retry_max_attempts,
        allocated_channel = %config.allocated_channel,
        "starting allocation consumer"
    );
    let reader = BufReader::new(tokio::io::stdin());
    let stats = consumer::run(&bus, reader, shutdown_signal()).await?;

    tracing::info!(
        received = stats.received,
        handled = stats.handled,
        skipped = stats.skipped,
        failed = stats.failed,
        "consumer stopped"
    );
    tracing::info!(metrics = %metrics_handle.render(), "final metrics snapshot");
    Ok(())
}
