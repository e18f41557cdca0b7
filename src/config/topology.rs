//! Validated view of the configured peers and routes.
//!
//! The raw config keeps npubs and CIDRs as the operator wrote them. The
//! control plane works from a [`Topology`] instead: identities decoded,
//! networks truncated to their prefix, and route networks checked for
//! uniqueness. It is built once at startup and never changes afterwards.

use ipnet::IpNet;

use super::{Config, ConfigError};
use crate::PeerIdentity;

/// A configured route with its target decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub network: IpNet,
    pub target: PeerIdentity,
}

/// Configured peers and routes, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    peers: Vec<PeerIdentity>,
    routes: Vec<Route>,
}

impl Topology {
    /// Build from already-decoded parts, enforcing the same invariants as
    /// [`Topology::from_config`].
    pub fn new(peers: Vec<PeerIdentity>, routes: Vec<Route>) -> Result<Self, ConfigError> {
        let mut checked: Vec<Route> = Vec::with_capacity(routes.len());
        for route in routes {
            let network = route.network.trunc();
            if checked.iter().any(|r| r.network == network) {
                return Err(ConfigError::DuplicateRoute(network));
            }
            if !peers.contains(&route.target) {
                return Err(ConfigError::UnknownRouteTarget {
                    network,
                    target: route.target.npub(),
                });
            }
            checked.push(Route {
                network,
                target: route.target,
            });
        }
        Ok(Self {
            peers,
            routes: checked,
        })
    }

    /// Decode and validate the `peers` and `routes` sections.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let peers = config
            .peers
            .iter()
            .map(|p| {
                p.identity().map_err(|e| ConfigError::InvalidPeerNpub {
                    npub: p.npub.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let routes = config
            .routes
            .iter()
            .map(|r| {
                let target = PeerIdentity::from_npub(&r.target).map_err(|e| {
                    ConfigError::InvalidPeerNpub {
                        npub: r.target.clone(),
                        source: e,
                    }
                })?;
                Ok(Route {
                    network: r.network,
                    target,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Self::new(peers, routes)
    }

    pub fn peers(&self) -> &[PeerIdentity] {
        &self.peers
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Look up a configured peer by identity.
    pub fn find_peer(&self, peer: &PeerIdentity) -> Option<&PeerIdentity> {
        self.peers.iter().find(|p| *p == peer)
    }

    /// Look up a configured route by its exact network.
    pub fn find_route(&self, network: &IpNet) -> Option<&Route> {
        self.routes.iter().find(|r| r.network == *network)
    }

    /// Networks of every configured route, in order.
    pub fn networks(&self) -> Vec<IpNet> {
        self.routes.iter().map(|r| r.network).collect()
    }
}
