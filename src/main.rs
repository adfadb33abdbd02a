//! stashbox -- single-node bucket and blob storage server.
//!
//! Crash-only design: every startup is a recovery. Collections are
//! rewritten through rename and blobs through temp-fsync-rename, so there
//! is no separate recovery mode. SIGTERM/SIGINT handlers only stop
//! accepting connections and wait with a timeout before exiting.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stashbox::config::{load_config_or_default, LoggingConfig};

/// Command-line arguments for the stashbox server.
#[derive(Parser, Debug)]
#[command(name = "stashbox", version, about = "Single-node bucket and blob storage server")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "stashbox.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

/// Initialize tracing. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_found = std::path::Path::new(&cli.config).exists();
    let config = load_config_or_default(&cli.config)?;
    init_tracing(&config.logging);
    if config_found {
        info!("Loaded configuration from {}", cli.config);
    } else {
        warn!("Config file {} not found, running with defaults", cli.config);
    }

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        stashbox::metrics::init_metrics();
        stashbox::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let state = Arc::new(stashbox::AppState::from_config(config)?);
    info!(
        metadata_dir = %state.config.metadata.dir,
        storage_root = %state.config.storage.root_dir,
        "stores opened"
    );
    if state.credentials.list().await?.is_empty() && !state.config.auth.open_credential_routes {
        warn!("no access keys exist yet; issue one with `stashbox-admin credential issue`");
    }
    let bucket_count = state.buckets.list().await?.len();
    metrics::gauge!(stashbox::metrics::BUCKETS_TOTAL).set(bucket_count as f64);

    let app = stashbox::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("stashbox listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections,
    // wait for in-flight requests to complete (with timeout), then exit.
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => joined??,
        _ = signalled_rx => {
            match tokio::time::timeout(shutdown_timeout, &mut server).await {
                Ok(joined) => joined??,
                Err(_) => warn!(
                    "shutdown timeout of {}s elapsed with requests still in flight",
                    shutdown_timeout.as_secs()
                ),
            }
        }
    }

    info!("stashbox shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
