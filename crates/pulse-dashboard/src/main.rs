//! cloudpulse server binary.
//!
//! Serves health snapshots of the configured Google Cloud projects.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pulse_core::Sources;
use pulse_dashboard::{DashboardConfig, DashboardServer};
use pulse_gcp::{GcpCloud, TokenProvider, TokenSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Cloud health monitoring API.
#[derive(Parser, Debug, Clone)]
#[command(name = "cloudpulse")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PULSE_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Monitoring configuration document.
    #[arg(long, env = "PULSE_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Allowed CORS origins.
    #[arg(
        long = "cors-origin",
        env = "PULSE_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    cors_origins: Vec<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let tokens = TokenProvider::from_env();
    if matches!(tokens.source(), TokenSource::Gcloud) {
        info!("no static access token set, using gcloud credentials");
    }
    let cloud = GcpCloud::new(Arc::new(tokens)).context("failed to build cloud client")?;

    let config = cli
        .cors_origins
        .iter()
        .filter(|origin| !origin.trim().is_empty())
        .fold(
            DashboardConfig::new(cli.bind).with_config_path(cli.config),
            |config, origin| config.with_cors_origin(origin.trim()),
        );

    info!(
        bind = %config.bind_addr,
        config = %config.config_path.display(),
        "Starting cloudpulse"
    );

    let server = DashboardServer::new(config, Sources::from_shared(Arc::new(cloud)));
    server
        .serve_with_shutdown(cli.bind, shutdown_signal())
        .await
        .context("dashboard server failed")?;
    Ok(())
}
