//! Status and Peers queries.

use super::ControlService;
use super::protocol::{ConnectionInfo, PeerConnectionInfo, PeersReply, StatusReply};

impl ControlService {
    /// Reconcile configured peers with live connectivity.
    ///
    /// A configured peer counts as connected once, however many sessions it
    /// has, but each of its sessions gets its own entry. Peers with no live
    /// session contribute nothing.
    pub fn status(&self) -> StatusReply {
        let mut connected_peers = 0;
        let mut peer_connections = Vec::new();

        for peer in self.topology.peers() {
            if !self.mesh.is_connected(peer) {
                continue;
            }
            connected_peers += 1;

            let latency = self.mesh.latency(peer);
            for conn in self.mesh.connections_to(peer) {
                peer_connections.push(PeerConnectionInfo {
                    address: conn.remote_addr,
                    peer: *peer,
                    latency,
                });
            }
        }

        StatusReply {
            local_id: self.mesh.local_identity(),
            total_connections: self.mesh.connections().len(),
            connected_peers,
            peer_connections,
            configured_peers: self.topology.peers().len(),
            listen_addrs: self.mesh.listen_addrs(),
        }
    }

    /// Every live connection, in the order the mesh reports them.
    pub fn peers(&self) -> PeersReply {
        let connections = self
            .mesh
            .connections()
            .into_iter()
            .map(|c| ConnectionInfo {
                address: c.remote_addr,
                peer: c.remote_peer,
            })
            .collect();
        PeersReply { connections }
    }
}
