//! Relay override table.
//!
//! Maps a destination network to a peer that should relay its traffic in
//! place of the route's configured target. The table is owned by the daemon
//! and shared by reference with the control plane and the forwarding path;
//! every operation takes the same lock, so concurrent relay/reset calls
//! observe a consistent table.

use ipnet::IpNet;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::PeerIdentity;

/// Network -> relay peer overrides, at most one per network.
#[derive(Debug, Default)]
pub struct RerouteTable {
    entries: Mutex<HashMap<IpNet, PeerIdentity>>,
}

impl RerouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The relay override for `network`, if one is installed.
    pub fn lookup(&self, network: &IpNet) -> Option<PeerIdentity> {
        self.lock().get(network).copied()
    }

    /// Install or overwrite the override for `network`.
    ///
    /// Returns the relay that was replaced, if any.
    pub fn set(&self, network: IpNet, relay: PeerIdentity) -> Option<PeerIdentity> {
        self.lock().insert(network, relay)
    }

    /// Remove the override for `network`. Clearing an absent entry is a no-op.
    ///
    /// Returns the relay that was removed, if any.
    pub fn clear(&self, network: &IpNet) -> Option<PeerIdentity> {
        self.lock().remove(network)
    }

    /// Number of active overrides.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Single insert/remove calls only: a poisoned guard still holds a valid map.
    fn lock(&self) -> MutexGuard<'_, HashMap<IpNet, PeerIdentity>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;
    use std::sync::Arc;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_lookup_empty() {
        let table = RerouteTable::new();
        assert!(table.lookup(&net("10.0.0.0/24")).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let table = RerouteTable::new();
        let a = Identity::generate().peer_identity();
        let b = Identity::generate().peer_identity();
        let n = net("10.0.0.0/24");

        assert_eq!(table.set(n, a), None);
        assert_eq!(table.set(n, b), Some(a));
        assert_eq!(table.lookup(&n), Some(b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clear_absent_is_noop() {
        let table = RerouteTable::new();
        let a = Identity::generate().peer_identity();
        let n = net("10.0.0.0/24");

        assert_eq!(table.clear(&n), None);
        table.set(n, a);
        assert_eq!(table.clear(&n), Some(a));
        assert_eq!(table.clear(&n), None);
        assert!(table.lookup(&n).is_none());
    }

    #[test]
    fn test_concurrent_writers() {
        let table = Arc::new(RerouteTable::new());
        let relay = Identity::generate().peer_identity();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    let n: IpNet = format!("10.{}.0.0/16", i).parse().unwrap();
                    for _ in 0..100 {
                        table.set(n, relay);
                        table.clear(&n);
                    }
                    table.set(n, relay);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 8);
    }
}
