//! In-process connectivity table.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::debug;

use super::{Connection, MeshView};
use crate::PeerIdentity;

/// SRTT gain: α = 1/8 (Jacobson, RFC 6298).
const SRTT_ALPHA_SHIFT: u32 = 3;

/// Exponentially weighted round-trip estimator.
///
/// The first sample initializes the estimate; later samples move it by
/// 1/8 of the difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrttEstimator {
    srtt_us: i64,
    initialized: bool,
}

impl SrttEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, rtt_us: i64) {
        if self.initialized {
            self.srtt_us += (rtt_us - self.srtt_us) >> SRTT_ALPHA_SHIFT;
        } else {
            self.srtt_us = rtt_us;
            self.initialized = true;
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn srtt_us(&self) -> i64 {
        self.srtt_us
    }

    /// Current estimate, or zero before the first sample.
    pub fn srtt(&self) -> Duration {
        Duration::from_micros(self.srtt_us.max(0) as u64)
    }
}

#[derive(Debug, Default)]
struct Inner {
    connections: Vec<Connection>,
    rtt: HashMap<PeerIdentity, SrttEstimator>,
    listen_addrs: Vec<String>,
}

/// Connectivity table updated by the transport layer and read by the
/// control plane.
#[derive(Debug)]
pub struct MeshState {
    local: PeerIdentity,
    inner: RwLock<Inner>,
}

impl MeshState {
    pub fn new(local: PeerIdentity) -> Self {
        Self {
            local,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Record a newly established session.
    pub fn add_connection(&self, connection: Connection) {
        debug!(
            peer = %connection.remote_peer.short_npub(),
            addr = %connection.remote_addr,
            "Connection added"
        );
        self.write().connections.push(connection);
    }

    /// Drop the session to `peer` over `remote_addr`.
    ///
    /// Returns false when no such session was known. The peer's RTT history
    /// is forgotten once its last session goes away.
    pub fn remove_connection(&self, peer: &PeerIdentity, remote_addr: &str) -> bool {
        let mut inner = self.write();
        let before = inner.connections.len();
        inner
            .connections
            .retain(|c| !(c.remote_peer == *peer && c.remote_addr == remote_addr));
        let removed = inner.connections.len() != before;

        if removed && !inner.connections.iter().any(|c| c.remote_peer == *peer) {
            inner.rtt.remove(peer);
        }
        if removed {
            debug!(peer = %peer.short_npub(), addr = %remote_addr, "Connection removed");
        }
        removed
    }

    /// Feed one round-trip measurement for `peer`.
    pub fn record_rtt(&self, peer: &PeerIdentity, rtt: Duration) {
        let rtt_us = i64::try_from(rtt.as_micros()).unwrap_or(i64::MAX);
        self.write().rtt.entry(*peer).or_default().update(rtt_us);
    }

    pub fn set_listen_addrs(&self, addrs: Vec<String>) {
        self.write().listen_addrs = addrs;
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MeshView for MeshState {
    fn local_identity(&self) -> PeerIdentity {
        self.local
    }

    fn is_connected(&self, peer: &PeerIdentity) -> bool {
        self.read().connections.iter().any(|c| c.remote_peer == *peer)
    }

    fn connections_to(&self, peer: &PeerIdentity) -> Vec<Connection> {
        self.read()
            .connections
            .iter()
            .filter(|c| c.remote_peer == *peer)
            .cloned()
            .collect()
    }

    fn latency(&self, peer: &PeerIdentity) -> Duration {
        self.read()
            .rtt
            .get(peer)
            .map(SrttEstimator::srtt)
            .unwrap_or_default()
    }

    fn connections(&self) -> Vec<Connection> {
        self.read().connections.clone()
    }

    fn listen_addrs(&self) -> Vec<String> {
        self.read().listen_addrs.clone()
    }
}
