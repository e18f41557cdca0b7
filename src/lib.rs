//! meshctl: administrative control plane for a mesh networking daemon.
//!
//! Lets a local operator inspect daemon health and configured routes, and
//! steer traffic for a destination network through a chosen relay peer,
//! over a Unix control socket.

pub mod config;
pub mod control;
pub mod identity;
pub mod mesh;
pub mod reroute;

// Re-export identity types
pub use identity::{
    decode_npub, decode_secret, encode_npub, encode_nsec, Identity, IdentityError, PeerIdentity,
};

// Re-export config types
pub use config::{Config, ConfigError, ControlConfig, PeerConfig, Route, RouteConfig, Topology};

// Re-export control plane types
pub use control::{
    ClientError, ControlClient, ControlError, ControlService, ControlSocket, Request, Response,
    RouteAction, SocketError,
};

pub use mesh::{Connection, MeshState, MeshView};
pub use reroute::RerouteTable;
