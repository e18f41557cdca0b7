//! Daemon Configuration
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./meshd.yaml` (current directory - highest priority)
//! 2. `~/.meshd.yaml` (legacy home location)
//! 3. `~/.config/meshd/meshd.yaml` (user config directory)
//! 4. `/etc/meshd/meshd.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority files.
//!
//! ```yaml
//! node:
//!   identity:
//!     nsec: "nsec1..."
//!   control:
//!     listen: /unix/run/meshd/control.sock
//! peers:
//!   - npub: "npub1..."
//!     alias: gateway
//! routes:
//!   - network: 10.0.0.0/24
//!     target: "npub1..."
//! ```

mod node;
mod peer;
mod route;
mod topology;

use crate::{Identity, IdentityError};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use node::{ControlConfig, NodeConfig};
pub use peer::PeerConfig;
pub use route::RouteConfig;
pub use topology::{Route, Topology};

/// Default config filename.
const CONFIG_FILENAME: &str = "meshd.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("invalid peer npub '{npub}': {source}")]
    InvalidPeerNpub {
        npub: String,
        source: IdentityError,
    },

    #[error("duplicate route for network {0}")]
    DuplicateRoute(IpNet),

    #[error("route {network} targets unconfigured peer {target}")]
    UnknownRouteTarget { network: IpNet, target: String },
}

/// Identity configuration (`node.identity.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Secret key in nsec (bech32) or hex format (`node.identity.nsec`).
    /// If not specified, a new keypair will be generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsec: Option<String>,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node configuration (`node.*`).
    #[serde(default)]
    pub node: NodeConfig,

    /// Static peers (`peers`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<PeerConfig>,

    /// Static routes (`routes`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/meshd").join(CONFIG_FILENAME)];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("meshd").join(CONFIG_FILENAME));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".meshd.yaml"));
        }

        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present. Peer and
    /// route lists are replaced wholesale when non-empty, so a route never
    /// ends up pointing at a peer list from a different file.
    pub fn merge(&mut self, other: Config) {
        if other.node.identity.nsec.is_some() {
            self.node.identity.nsec = other.node.identity.nsec;
        }
        if !other.node.control.enabled {
            self.node.control.enabled = false;
        }
        if other.node.control.has_custom_listen() {
            self.node.control.listen = other.node.control.listen;
        }
        if !other.peers.is_empty() {
            self.peers = other.peers;
        }
        if !other.routes.is_empty() {
            self.routes = other.routes;
        }
    }

    /// Create an Identity from this configuration.
    ///
    /// If an nsec is configured, uses that to create the identity.
    /// Otherwise, generates a new random identity.
    pub fn create_identity(&self) -> Result<Identity, ConfigError> {
        match &self.node.identity.nsec {
            Some(nsec) => Ok(Identity::from_secret_str(nsec)?),
            None => Ok(Identity::generate()),
        }
    }

    /// Check if an identity is configured (vs. will be generated).
    pub fn has_identity(&self) -> bool {
        self.node.identity.nsec.is_some()
    }

    /// Decode and validate peers and routes.
    pub fn topology(&self) -> Result<Topology, ConfigError> {
        Topology::from_config(self)
    }
}
