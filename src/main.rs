use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gatehouse::config::{GatehouseConfig, Mode};
use gatehouse::governance::Governance;
use gatehouse::http::{AppState, HttpServer};

/// Request governance service: rate limiting, audit logging and error
/// classification in front of a small HTTP API.
#[derive(Debug, Parser)]
#[command(name = "gatehouse", version, about)]
struct Args {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Runtime environment, overriding the configuration
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Listen address, overriding the configuration
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GatehouseConfig::load(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(listen) = args.listen {
        config.server.http_addr = listen;
    }
    config.validate()?;

    init_tracing(config.mode);

    info!("Starting Gatehouse Request Governance Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        mode = %config.mode,
        http_addr = %config.server.http_addr,
        rate_limiting = config.rate_limiting.enabled,
        audit = config.audit.enabled,
        "Configuration loaded"
    );

    let governance = Governance::from_config(&config);
    info!("Governance layer initialized");

    let server = HttpServer::new(config.server.http_addr, AppState::new(governance));
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Gatehouse Request Governance Service stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the default `info`.
fn init_tracing(mode: Mode) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if mode.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
