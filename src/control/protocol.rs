//! Control socket wire types.
//!
//! Sessions exchange newline-delimited JSON: one [`Request`] per line from
//! the client, one [`Response`] per line back, in order.
//!
//! ```text
//! -> {"method":"route","params":{"action":"relay","args":["10.0.0.0/24","npub1..."]}}
//! <- {"status":"ok","reply":{"kind":"route","routes":[]}}
//! -> {"method":"route","params":{"action":"reset","args":["10.9.0.0/24"]}}
//! <- {"status":"error","code":"unknown_network","message":"no such network: 10.9.0.0/24"}
//! ```

use std::fmt;
use std::time::Duration;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::ControlError;
use crate::PeerIdentity;

/// A control call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Request {
    Status,
    Route(RouteArgs),
    Peers,
}

impl Request {
    /// Method name for logging.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Status => "status",
            Request::Route(_) => "route",
            Request::Peers => "peers",
        }
    }
}

/// Route sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    /// List configured routes and their effective relay.
    Show,
    /// `relay <network|all> <npub>`: send a network's traffic through a peer.
    Relay,
    /// `reset <network|all>`: drop relay overrides.
    Reset,
    /// Any action name this daemon does not recognize.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteAction::Show => "show",
            RouteAction::Relay => "relay",
            RouteAction::Reset => "reset",
            RouteAction::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Parameters of a Route call. `args` is interpreted per action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteArgs {
    pub action: RouteAction,
    #[serde(default)]
    pub args: Vec<String>,
}

impl RouteArgs {
    pub fn new<I, S>(action: RouteAction, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// A live session to a configured peer, as reported by Status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConnectionInfo {
    /// Remote transport address of the session.
    pub address: String,
    pub peer: PeerIdentity,
    /// Smoothed RTT to the peer; zero when not yet measured.
    pub latency: Duration,
}

/// Health snapshot of the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub local_id: PeerIdentity,
    /// All live connections, configured peers or not.
    pub total_connections: usize,
    /// Configured peers with at least one live connection.
    pub connected_peers: usize,
    /// One entry per live connection to a configured peer.
    pub peer_connections: Vec<PeerConnectionInfo>,
    pub configured_peers: usize,
    pub listen_addrs: Vec<String>,
}

/// One configured route and its effective next hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub network: IpNet,
    /// The route's configured target.
    pub target: PeerIdentity,
    /// Where traffic actually goes: the override if set, else `target`.
    pub relay: PeerIdentity,
    pub is_relay: bool,
    /// Whether `target` currently has a live session.
    pub is_connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteReply {
    /// Filled by Show; empty for Relay and Reset.
    #[serde(default)]
    pub routes: Vec<RouteInfo>,
}

/// A live session, as reported by Peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub address: String,
    pub peer: PeerIdentity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeersReply {
    #[serde(default)]
    pub connections: Vec<ConnectionInfo>,
}

/// Successful call result, tagged by the method that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Status(StatusReply),
    Route(RouteReply),
    Peers(PeersReply),
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { reply: Reply },
    Error { code: String, message: String },
}

impl Response {
    pub fn error(err: &ControlError) -> Self {
        Response::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }
}
