//! Route inspection and relay overrides.
//!
//! `relay` and `reset` resolve every argument before touching the reroute
//! table, so a rejected call never leaves some networks rerouted and others
//! not.

use ipnet::IpNet;
use tracing::info;

use super::protocol::{RouteAction, RouteArgs, RouteInfo, RouteReply};
use super::{ControlError, ControlService};
use crate::PeerIdentity;

/// Network selector that expands to every configured route.
pub const ALL_NETWORKS: &str = "all";

impl ControlService {
    /// Handle a Route call.
    pub fn route(&self, args: RouteArgs) -> Result<RouteReply, ControlError> {
        match args.action {
            RouteAction::Show => Ok(RouteReply {
                routes: self.show_routes(),
            }),
            RouteAction::Relay => {
                self.relay(&args.args)?;
                Ok(RouteReply::default())
            }
            RouteAction::Reset => {
                self.reset(&args.args)?;
                Ok(RouteReply::default())
            }
            RouteAction::Unknown => Err(ControlError::UnknownAction),
        }
    }

    fn show_routes(&self) -> Vec<RouteInfo> {
        self.topology
            .routes()
            .iter()
            .map(|route| {
                let relay = self.reroutes.lookup(&route.network);
                RouteInfo {
                    network: route.network,
                    target: route.target,
                    relay: relay.unwrap_or(route.target),
                    is_relay: relay.is_some(),
                    is_connected: self.mesh.is_connected(&route.target),
                }
            })
            .collect()
    }

    fn relay(&self, args: &[String]) -> Result<(), ControlError> {
        expect_args(args, 2)?;
        let networks = self.resolve_networks(&args[0])?;
        let relay = self.resolve_peer(&args[1])?;

        for network in networks {
            let previous = self.reroutes.set(network, relay);
            info!(
                network = %network,
                relay = %relay.short_npub(),
                replaced = ?previous.map(|p| p.short_npub()),
                "Relay override installed"
            );
        }
        Ok(())
    }

    fn reset(&self, args: &[String]) -> Result<(), ControlError> {
        expect_args(args, 1)?;
        let networks = self.resolve_networks(&args[0])?;

        for network in networks {
            if let Some(previous) = self.reroutes.clear(&network) {
                info!(
                    network = %network,
                    relay = %previous.short_npub(),
                    "Relay override removed"
                );
            }
        }
        Ok(())
    }

    /// `all`, or one CIDR that exactly matches a configured route.
    fn resolve_networks(&self, selector: &str) -> Result<Vec<IpNet>, ControlError> {
        if selector == ALL_NETWORKS {
            return Ok(self.topology.networks());
        }

        let network = selector
            .parse::<IpNet>()
            .map_err(|e| ControlError::InvalidNetwork {
                input: selector.to_string(),
                reason: e.to_string(),
            })?
            .trunc();

        match self.topology.find_route(&network) {
            Some(route) => Ok(vec![route.network]),
            None => Err(ControlError::UnknownNetwork(network)),
        }
    }

    /// An npub that belongs to a configured peer.
    fn resolve_peer(&self, selector: &str) -> Result<PeerIdentity, ControlError> {
        let peer = PeerIdentity::from_npub(selector).map_err(|e| ControlError::InvalidPeer {
            input: selector.to_string(),
            reason: e.to_string(),
        })?;

        self.topology
            .find_peer(&peer)
            .copied()
            .ok_or(ControlError::UnknownPeer(peer))
    }
}

fn expect_args(args: &[String], expected: usize) -> Result<(), ControlError> {
    if args.len() != expected {
        return Err(ControlError::ArgumentCount {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}
