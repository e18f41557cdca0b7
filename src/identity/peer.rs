//! Remote peer identity (public key only).

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::{IdentityError, decode_npub, encode_npub};

/// A peer's identity in the mesh.
///
/// Serialized as its npub string, so configuration files, control replies
/// and CLI arguments all share one textual form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    pubkey: XOnlyPublicKey,
}

impl PeerIdentity {
    /// Create a PeerIdentity from an x-only public key.
    pub fn from_pubkey(pubkey: XOnlyPublicKey) -> Self {
        Self { pubkey }
    }

    /// Create a PeerIdentity from a bech32-encoded npub string.
    pub fn from_npub(npub: &str) -> Result<Self, IdentityError> {
        Ok(Self::from_pubkey(decode_npub(npub)?))
    }

    /// Return the x-only public key.
    pub fn pubkey(&self) -> XOnlyPublicKey {
        self.pubkey
    }

    /// Return the public key as a bech32-encoded npub string (NIP-19).
    pub fn npub(&self) -> String {
        encode_npub(&self.pubkey)
    }

    /// Abbreviated npub for log lines and tables: `npub1abcd…wxyz`.
    pub fn short_npub(&self) -> String {
        let npub = self.npub();
        format!("{}…{}", &npub[..9], &npub[npub.len() - 4..])
    }
}

impl FromStr for PeerIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_npub(s)
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PeerIdentity").field(&self.short_npub()).finish()
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.npub())
    }
}

impl Serialize for PeerIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.npub())
    }
}

impl<'de> Deserialize<'de> for PeerIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let npub = String::deserialize(deserializer)?;
        Self::from_npub(&npub).map_err(serde::de::Error::custom)
    }
}
