//! Administrative Control Plane
//!
//! Serves three operations to a local operator over a Unix socket:
//!
//! - **Status**: own identity, connection counts, live sessions to configured
//!   peers with their latency, and listen addresses.
//! - **Route**: show configured routes with any relay override, install a
//!   relay override (`relay`), or remove one (`reset`).
//! - **Peers**: every live session, configured or not.
//!
//! [`ControlService`] holds no state of its own. Everything it reports or
//! changes lives in the configured [`Topology`], the live [`MeshView`] and
//! the shared [`RerouteTable`].

pub mod client;
pub mod protocol;
mod route;
pub mod socket;
mod status;

use std::sync::Arc;

use ipnet::IpNet;
use thiserror::Error;
use tracing::debug;

use crate::config::Topology;
use crate::mesh::MeshView;
use crate::reroute::RerouteTable;
use crate::PeerIdentity;

pub use client::{ClientError, ControlClient};
pub use protocol::{
    ConnectionInfo, PeerConnectionInfo, PeersReply, Reply, Request, Response, RouteAction,
    RouteArgs, RouteInfo, RouteReply, StatusReply,
};
pub use route::ALL_NETWORKS;
pub use socket::{unix_socket_path, ControlSocket, SocketError, MAX_REQUEST_LINE, SOCKET_MODE};

/// Per-request failures reported to the control client.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("expected exactly {expected} {}, got {got}", arguments(.expected))]
    ArgumentCount { expected: usize, got: usize },

    #[error("invalid network '{input}': {reason}")]
    InvalidNetwork { input: String, reason: String },

    #[error("no such network: {0}")]
    UnknownNetwork(IpNet),

    #[error("invalid peer '{input}': {reason}")]
    InvalidPeer { input: String, reason: String },

    #[error("no such peer: {0}")]
    UnknownPeer(PeerIdentity),

    #[error("no such action")]
    UnknownAction,

    #[error("malformed request: {0}")]
    BadRequest(String),
}

impl ControlError {
    /// Stable machine-readable tag carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            ControlError::ArgumentCount { .. } => "argument_count",
            ControlError::InvalidNetwork { .. } => "invalid_network",
            ControlError::UnknownNetwork(_) => "unknown_network",
            ControlError::InvalidPeer { .. } => "invalid_peer",
            ControlError::UnknownPeer(_) => "unknown_peer",
            ControlError::UnknownAction => "unknown_action",
            ControlError::BadRequest(_) => "bad_request",
        }
    }
}

fn arguments(count: &usize) -> &'static str {
    if *count == 1 { "argument" } else { "arguments" }
}

/// Request dispatcher for the control socket.
pub struct ControlService {
    mesh: Arc<dyn MeshView>,
    topology: Arc<Topology>,
    reroutes: Arc<RerouteTable>,
}

impl ControlService {
    pub fn new(
        mesh: Arc<dyn MeshView>,
        topology: Arc<Topology>,
        reroutes: Arc<RerouteTable>,
    ) -> Self {
        Self {
            mesh,
            topology,
            reroutes,
        }
    }

    pub fn reroutes(&self) -> &RerouteTable {
        &self.reroutes
    }

    /// Run one request to completion.
    ///
    /// Calls are independent: nothing is remembered between them, and a
    /// failed call leaves every shared table as it found it.
    pub fn dispatch(&self, request: Request) -> Response {
        let method = request.method();
        let result = match request {
            Request::Status => Ok(Reply::Status(self.status())),
            Request::Route(args) => self.route(args).map(Reply::Route),
            Request::Peers => Ok(Reply::Peers(self.peers())),
        };

        match result {
            Ok(reply) => Response::Ok { reply },
            Err(e) => {
                debug!(method, code = e.code(), error = %e, "Control request failed");
                Response::error(&e)
            }
        }
    }
}
