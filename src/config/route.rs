//! Static route entries (`routes[]`).

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// A configured route: traffic for `network` is delivered to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Destination network in CIDR notation (`routes[].network`).
    pub network: IpNet,

    /// npub of the peer responsible for the network (`routes[].target`).
    pub target: String,
}

impl RouteConfig {
    pub fn new(network: IpNet, target: impl Into<String>) -> Self {
        Self {
            network,
            target: target.into(),
        }
    }
}
