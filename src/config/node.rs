//! Node-level configuration subsections (`node.*`).

use serde::{Deserialize, Serialize};

use super::IdentityConfig;

/// Default control socket listen address.
const DEFAULT_CONTROL_LISTEN: &str = "/unix/run/meshd/control.sock";

/// Control socket (`node.control.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Serve the control socket (`node.control.enabled`).
    #[serde(default = "ControlConfig::default_enabled")]
    pub enabled: bool,
    /// Structured listen address, `/unix/<path>` (`node.control.listen`).
    #[serde(default = "ControlConfig::default_listen")]
    pub listen: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: DEFAULT_CONTROL_LISTEN.to_string(),
        }
    }
}

impl ControlConfig {
    fn default_enabled() -> bool { true }
    fn default_listen() -> String { DEFAULT_CONTROL_LISTEN.to_string() }

    /// Whether `listen` differs from the built-in default.
    pub fn has_custom_listen(&self) -> bool {
        self.listen != DEFAULT_CONTROL_LISTEN
    }
}

/// Node configuration (`node.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity configuration (`node.identity.*`).
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Control socket (`node.control.*`).
    #[serde(default)]
    pub control: ControlConfig,
}
