//! Lattice Gateway - REST front end for the control plane.
//!
//! Serves the hypermedia API over TLS (or plain HTTP in debug mode),
//! keeps the session store, and forwards commands and credential checks
//! to the control plane socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use lattice_auth::SessionStore;
use lattice_gateway::config::GatewayConfig;
use lattice_gateway::negotiate::OutputRegistry;
use lattice_gateway::state::AppState;
use lattice_gateway::upstream::ControlPlaneClient;
use lattice_gateway::{routes, templates, tls};

// ============================================================================
// CLI Definition
// ============================================================================

/// Lattice Gateway - hypermedia REST API for the control plane
#[derive(Parser)]
#[command(name = "lattice-gateway", version, about)]
struct Cli {
    /// Path to the gateway configuration file
    #[arg(long, default_value = "/etc/lattice/gateway.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default if no command given)
    Serve,

    /// Validate the configuration and certificate paths, then exit
    CheckConfig,
}

/// How often idle sessions are swept out of the store.
const SESSION_PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cmd_serve(&cli.config).await,
        Commands::CheckConfig => cmd_check_config(&cli.config),
    }
}

/// Validate the configuration the way a non-debug start would.
fn cmd_check_config(path: &Path) -> anyhow::Result<()> {
    let config = GatewayConfig::load(path)?;
    config.socket_addr()?;
    if !config.debug {
        config.verify_certs()?;
    }
    println!("configuration ok: {}", path.display());
    Ok(())
}

/// Start the gateway server.
async fn cmd_serve(path: &Path) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(GatewayConfig::load(path).context("loading configuration")?);
    let addr = config.socket_addr()?;

    let sessions = Arc::new(SessionStore::new(config.session_timeout));
    let upstream = Arc::new(ControlPlaneClient::new(config.control_socket.clone()));
    let output = OutputRegistry::standard();
    let template_env = Arc::new(templates::environment().context("compiling templates")?);

    let state = AppState {
        config: config.clone(),
        sessions: sessions.clone(),
        authenticator: upstream.clone(),
        backend: upstream,
        output,
        templates: template_env,
    };

    // Sweep idle sessions in the background for the life of the process.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "purged idle sessions");
            }
        }
    });

    let app = routes::router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    if config.debug {
        tracing::info!(%addr, "serving plain HTTP (debug mode)");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        let (crt, key) = config.verify_certs()?;
        let tls_config = tls::server_config(crt, key).context("building TLS config")?;
        tracing::info!(%addr, "serving HTTPS");
        tls::serve(listener, tls_config, app, shutdown_signal()).await?;
    }

    tracing::info!("gateway stopped");
    Ok(())
}

/// Resolve when the process is told to stop.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
