//! Live mesh connectivity as seen by the control plane.
//!
//! The transport layer owns sessions, NAT traversal and encryption. The
//! control plane only needs a read-only view of the result: who is connected,
//! over which remote addresses, and how far away they are. [`MeshView`] is
//! that seam; [`MeshState`] is the in-process implementation the transport
//! layer feeds.

mod state;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::PeerIdentity;

pub use state::{MeshState, SrttEstimator};

/// One live session to a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Transport address of the remote end, e.g. `udp/192.0.2.7:4000`.
    pub remote_addr: String,
    /// Authenticated identity of the remote end.
    pub remote_peer: PeerIdentity,
}

impl Connection {
    pub fn new(remote_addr: impl Into<String>, remote_peer: PeerIdentity) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            remote_peer,
        }
    }
}

/// Read-only view of the local node and its live connections.
///
/// Implementations answer from local state; none of these calls may block
/// on network round-trips.
pub trait MeshView: Send + Sync {
    /// This node's identity.
    fn local_identity(&self) -> PeerIdentity;

    /// Whether at least one live session to `peer` exists.
    fn is_connected(&self, peer: &PeerIdentity) -> bool;

    /// Live connections to `peer`, in establishment order.
    fn connections_to(&self, peer: &PeerIdentity) -> Vec<Connection>;

    /// Smoothed round-trip estimate for `peer`. Zero when never measured.
    fn latency(&self, peer: &PeerIdentity) -> Duration;

    /// Every live connection, configured peer or not.
    fn connections(&self) -> Vec<Connection>;

    /// Addresses this node is listening on.
    fn listen_addrs(&self) -> Vec<String>;
}
