//! Resource key types.

use crate::asymmetric::KeyPair;
use crate::error::CryptoResult;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a resource symmetric key in bytes (AES-128).
pub const SYMMETRIC_KEY_SIZE: usize = 16;

/// A raw AES-128-CBC key protecting one resource's records.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; SYMMETRIC_KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// The key a resource's records are encrypted with.
///
/// Resources created before the move to symmetric keys are protected by a
/// full EC key pair, so both shapes are accepted wherever a resource key is.
#[derive(Clone, Debug)]
pub enum ResourceKey {
    Symmetric(SymmetricKey),
    Asymmetric(KeyPair),
}

impl ResourceKey {
    /// Serializes the key for wrapping: raw bytes for a symmetric key, the
    /// exported private key text for a key pair.
    pub fn export(&self) -> CryptoResult<Vec<u8>> {
        match self {
            ResourceKey::Symmetric(key) => Ok(key.as_bytes().to_vec()),
            ResourceKey::Asymmetric(key_pair) => Ok(key_pair.export()?.into_bytes()),
        }
    }

    pub fn as_key_pair(&self) -> Option<&KeyPair> {
        match self {
            ResourceKey::Asymmetric(key_pair) => Some(key_pair),
            ResourceKey::Symmetric(_) => None,
        }
    }
}

impl From<SymmetricKey> for ResourceKey {
    fn from(key: SymmetricKey) -> Self {
        ResourceKey::Symmetric(key)
    }
}

impl From<KeyPair> for ResourceKey {
    fn from(key_pair: KeyPair) -> Self {
        ResourceKey::Asymmetric(key_pair)
    }
}
