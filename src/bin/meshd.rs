//! Mesh daemon control plane host.
//!
//! Loads configuration, builds the control service over the node's
//! connectivity state and relay table, and serves the control socket until
//! SIGINT or SIGTERM.

use clap::Parser;
use meshctl::{Config, ControlService, ControlSocket, MeshState, MeshView, RerouteTable};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Mesh network daemon
#[derive(Parser, Debug)]
#[command(name = "meshd", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    info!("meshd starting");

    let (config, loaded_paths) = if let Some(config_path) = &args.config {
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    if !config.has_identity() {
        warn!("No identity configured, generating ephemeral keypair");
    }
    let identity = match config.create_identity() {
        Ok(identity) => identity,
        Err(e) => {
            error!("Failed to create identity: {}", e);
            std::process::exit(1);
        }
    };

    let topology = match config.topology() {
        Ok(topology) => topology,
        Err(e) => {
            error!("Invalid peer/route configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("  npub: {}", identity.npub());
    for peer in &config.peers {
        info!(npub = %peer.npub, alias = ?peer.alias, "Configured peer");
    }
    for route in topology.routes() {
        info!(network = %route.network, target = %route.target.short_npub(), "Configured route");
    }

    let mesh = Arc::new(MeshState::new(identity.peer_identity()));
    let reroutes = Arc::new(RerouteTable::new());
    let service = Arc::new(ControlService::new(
        mesh as Arc<dyn MeshView>,
        Arc::new(topology),
        reroutes,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let control_task = if config.node.control.enabled {
        let socket = match ControlSocket::bind(&config.node.control) {
            Ok(socket) => socket,
            Err(e) => {
                error!("Failed to launch control socket: {}", e);
                std::process::exit(1);
            }
        };
        Some(tokio::spawn(socket.run(service, shutdown_rx)))
    } else {
        warn!("Control socket disabled by configuration");
        None
    };

    info!("meshd running, press Ctrl+C to exit");

    wait_for_shutdown_signal().await;

    info!("meshd shutting down");

    let _ = shutdown_tx.send(true);
    if let Some(task) = control_task
        && let Err(e) = task.await
    {
        warn!("Control socket task failed: {}", e);
    }

    info!("meshd shutdown complete");
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
        _ = sigterm.recv() => info!("SIGTERM received"),
    }
}
