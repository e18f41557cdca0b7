//! Static peer entries (`peers[]`).

use serde::{Deserialize, Serialize};

use crate::{IdentityError, PeerIdentity};

/// A configured mesh peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// The peer's npub (`peers[].npub`).
    pub npub: String,

    /// Human-readable name shown by the CLI (`peers[].alias`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl PeerConfig {
    pub fn new(npub: impl Into<String>) -> Self {
        Self {
            npub: npub.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Decode the configured npub.
    pub fn identity(&self) -> Result<PeerIdentity, IdentityError> {
        PeerIdentity::from_npub(&self.npub)
    }
}
