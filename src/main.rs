//! FlowATS Gateway binary.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowats_gateway::config::{config_from_env, load_config};
use flowats_gateway::http::{AppState, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "gateway", about = "FlowATS observability gateway")]
struct Args {
    /// Path to a TOML config file. Defaults plus environment overrides are
    /// used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address from config.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowats_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        metrics_capacity = config.observability.metrics_capacity,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(AppState::from_config(config));
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
