//! Mesh Identity
//!
//! Peers are identified by secp256k1 x-only public keys, written as NIP-19
//! bech32 `npub` strings everywhere an operator sees or types them. The
//! local daemon holds a full keypair, loaded from an `nsec` (or raw hex)
//! secret or generated at startup.

mod local;
mod peer;

use bech32::{Bech32, Hrp};
use secp256k1::{SecretKey, XOnlyPublicKey};
use thiserror::Error;

pub use local::Identity;
pub use peer::PeerIdentity;

/// Human-readable part for npub (NIP-19).
const NPUB_HRP: Hrp = Hrp::parse_unchecked("npub");

/// Human-readable part for nsec (NIP-19).
const NSEC_HRP: Hrp = Hrp::parse_unchecked("nsec");

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid key: {0}")]
    InvalidKey(#[from] secp256k1::Error),

    #[error("bech32 decoding error: {0}")]
    Bech32Decode(#[from] bech32::DecodeError),

    #[error("invalid npub: expected 'npub' prefix, got '{0}'")]
    InvalidNpubPrefix(String),

    #[error("invalid npub: expected 32 bytes, got {0}")]
    InvalidNpubLength(usize),

    #[error("invalid nsec: expected 'nsec' prefix, got '{0}'")]
    InvalidNsecPrefix(String),

    #[error("invalid nsec: expected 32 bytes, got {0}")]
    InvalidNsecLength(usize),

    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Encode an x-only public key as a bech32 npub string (NIP-19).
pub fn encode_npub(pubkey: &XOnlyPublicKey) -> String {
    encode_key(NPUB_HRP, &pubkey.serialize())
}

/// Encode a secret key as a bech32 nsec string (NIP-19).
pub fn encode_nsec(secret_key: &SecretKey) -> String {
    encode_key(NSEC_HRP, &secret_key.secret_bytes())
}

/// Decode an npub string to an x-only public key.
pub fn decode_npub(npub: &str) -> Result<XOnlyPublicKey, IdentityError> {
    let (hrp, data) = bech32::decode(npub)?;
    if hrp != NPUB_HRP {
        return Err(IdentityError::InvalidNpubPrefix(hrp.to_string()));
    }
    if data.len() != 32 {
        return Err(IdentityError::InvalidNpubLength(data.len()));
    }
    Ok(XOnlyPublicKey::from_slice(&data)?)
}

/// Decode a secret key from either nsec (bech32) or hex format.
pub fn decode_secret(s: &str) -> Result<SecretKey, IdentityError> {
    let bytes = if s.starts_with("nsec1") {
        let (hrp, data) = bech32::decode(s)?;
        if hrp != NSEC_HRP {
            return Err(IdentityError::InvalidNsecPrefix(hrp.to_string()));
        }
        data
    } else {
        hex::decode(s)?
    };

    if bytes.len() != 32 {
        return Err(IdentityError::InvalidNsecLength(bytes.len()));
    }
    Ok(SecretKey::from_slice(&bytes)?)
}

fn encode_key(hrp: Hrp, bytes: &[u8; 32]) -> String {
    bech32::encode::<Bech32>(hrp, bytes).expect("32-byte key encoding cannot fail")
}
