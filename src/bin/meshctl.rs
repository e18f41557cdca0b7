//! Operator CLI for a running meshd.
//!
//! Talks to the daemon's control socket and prints human-readable results.

use clap::{Parser, Subcommand};
use meshctl::control::{unix_socket_path, ALL_NETWORKS};
use meshctl::control::{PeersReply, RouteReply, StatusReply};
use meshctl::{Config, ControlClient, RouteAction};
use std::path::PathBuf;

/// Control a running mesh daemon
#[derive(Parser, Debug)]
#[command(name = "meshctl", version, about)]
struct Args {
    /// Control socket path (default: taken from the daemon configuration)
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show node identity, connections and listen addresses
    Status,
    /// List every live connection
    Peers,
    /// Inspect or override route relays
    Route {
        #[command(subcommand)]
        action: RouteCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RouteCommand {
    /// List configured routes and their effective relay
    Show,
    /// Send a network's traffic through a relay peer
    Relay {
        /// Destination network in CIDR form, or "all"
        network: String,
        /// Relay peer npub
        peer: String,
    },
    /// Remove a relay override
    Reset {
        /// Destination network in CIDR form, or "all"
        network: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let socket = match args.socket {
        Some(path) => path,
        None => {
            let config = match &args.config {
                Some(path) => Config::load_file(path)?,
                None => Config::load()?.0,
            };
            unix_socket_path(&config.node.control.listen)?
        }
    };

    let mut client = ControlClient::connect(&socket).await?;

    match args.command {
        Command::Status => print_status(&client.status().await?),
        Command::Peers => print_peers(&client.peers().await?),
        Command::Route { action } => match action {
            RouteCommand::Show => {
                let reply = client.route(RouteAction::Show, Vec::<String>::new()).await?;
                print_routes(&reply);
            }
            RouteCommand::Relay { network, peer } => {
                client.route(RouteAction::Relay, [network.clone(), peer.clone()]).await?;
                println!("{} now relayed through {}", describe(&network), peer);
            }
            RouteCommand::Reset { network } => {
                client.route(RouteAction::Reset, [network.clone()]).await?;
                println!("{} reset to its configured target", describe(&network));
            }
        },
    }

    Ok(())
}

fn describe(network: &str) -> String {
    if network == ALL_NETWORKS {
        "all routes".to_string()
    } else {
        network.to_string()
    }
}

fn print_status(status: &StatusReply) {
    println!("Local identity: {}", status.local_id);
    println!(
        "Connections: {} total, {}/{} configured peers connected",
        status.total_connections, status.connected_peers, status.configured_peers
    );
    if !status.peer_connections.is_empty() {
        println!("Peer connections:");
        for conn in &status.peer_connections {
            println!("  {}/p2p/{} ({:.1?})", conn.address, conn.peer, conn.latency);
        }
    }
    if !status.listen_addrs.is_empty() {
        println!("Listening on:");
        for addr in &status.listen_addrs {
            println!("  {}", addr);
        }
    }
}

fn print_peers(peers: &PeersReply) {
    if peers.connections.is_empty() {
        println!("No live connections");
        return;
    }
    for conn in &peers.connections {
        println!("{}/p2p/{}", conn.address, conn.peer);
    }
}

fn print_routes(reply: &RouteReply) {
    if reply.routes.is_empty() {
        println!("No routes configured");
        return;
    }
    for route in &reply.routes {
        let state = if route.is_connected { "connected" } else { "disconnected" };
        if route.is_relay {
            println!(
                "{} via {} (relay; target {} {})",
                route.network,
                route.relay.short_npub(),
                route.target.short_npub(),
                state
            );
        } else {
            println!("{} via {} ({})", route.network, route.target.short_npub(), state);
        }
    }
}
