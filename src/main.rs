use anyhow::{Context, Result};
use clap::Parser;
use gemini_relay::config::{load_config, ObservabilityConfig};
use gemini_relay::relay::{RelayHandler, UpstreamClient};
use gemini_relay::routes::create_router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server bind address
    #[arg(short, long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Upstream model identifier
    #[arg(short, long, env = "RELAY_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let (mut config, credential) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config.observability.tracing_level)?;

    info!("Starting GeminiRelay server...");

    if let Some(model) = args.model {
        config.upstream.model = model;
    }

    if credential.is_none() {
        warn!(
            "{} is not set; relay requests will fail with a missing API key error",
            config.relay.credential_env
        );
    }

    if config.observability.metrics_enabled {
        install_metrics_exporter(&config.observability)?;
    }

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_addr.clone());

    // Initialize components
    let upstream_client = UpstreamClient::new(config.upstream.clone())
        .context("Failed to create upstream client")?;
    info!("Relaying to {}", upstream_client.endpoint());
    let handler = Arc::new(
        RelayHandler::new(upstream_client, credential, config.relay.error_shape)
            .with_body_limit(config.server.request_body_limit_bytes),
    );

    let app = create_router(handler, &config.server.relay_path);

    // Start server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!(
        "GeminiRelay server running at http://{}{}",
        bind_addr, config.server.relay_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("gemini_relay={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

fn install_metrics_exporter(config: &ObservabilityConfig) -> Result<()> {
    let addr: SocketAddr = config
        .metrics_bind
        .parse()
        .with_context(|| format!("Invalid metrics bind address {}", config.metrics_bind))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
