//! Asymmetric key pairs and key wrapping.
//!
//! A [`KeyPair`] is either an EC key (BIP-32 node over secp256k1, ECIES) or a
//! legacy RSA key (OAEP, PKCS#1 v1.5). Both expose the same capabilities:
//! sign, encrypt, decrypt, wrap and unwrap resource keys, export.
//!
//! Wrapping encrypts an exported resource key under a public key so only the
//! holder of the matching private key can recover it. Wrapped keys travel as
//! base64 together with a [`WrappedKeyType`] telling the unwrap side what the
//! plaintext is.

pub mod ec;
pub mod rsa;

use crate::aes;
use crate::error::{CryptoError, CryptoResult};
use crate::key::ResourceKey;
use crate::seed::{generate_mnemonic, mnemonic_to_seed_unchecked};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use self::ec::{EcKeyPair, Provenance};
pub use self::rsa::{RsaBackend, RsaKeyPair};

/// Asymmetric cryptosystem of a key pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "EC")]
    Ec,
    #[serde(rename = "RSA")]
    Rsa,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ec => "EC",
            KeyType::Rsa => "RSA",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a wrapped key decrypts to (`keyType` on resources and memberships).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrappedKeyType {
    /// An exported EC private key.
    #[serde(rename = "EC")]
    Ec,
    /// A raw AES-128-CBC key.
    #[serde(rename = "AES-CBC")]
    AesCbc,
}

impl WrappedKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WrappedKeyType::Ec => "EC",
            WrappedKeyType::AesCbc => aes::ALGORITHM,
        }
    }
}

/// An EC or RSA key pair.
#[derive(Clone)]
pub enum KeyPair {
    Ec(EcKeyPair),
    Rsa(RsaKeyPair),
}

impl KeyPair {
    /// Derives a key pair of `key_type` from seed bytes.
    pub fn from_seed(key_type: KeyType, seed: &[u8]) -> CryptoResult<Self> {
        match key_type {
            KeyType::Ec => Ok(KeyPair::Ec(EcKeyPair::from_seed(seed)?)),
            KeyType::Rsa => Ok(KeyPair::Rsa(RsaBackend::get().derive_from_seed(seed)?)),
        }
    }

    /// Derives a key pair from a mnemonic phrase. The checksum is not
    /// validated here; see [`crate::seed::get_seed`].
    pub fn from_mnemonic(key_type: KeyType, mnemonic: &str) -> CryptoResult<Self> {
        Self::from_seed(key_type, &mnemonic_to_seed_unchecked(mnemonic))
    }

    /// Restores an EC key pair from its `xprv` serialization.
    pub fn from_private_key(extended_key: &str) -> CryptoResult<Self> {
        Ok(KeyPair::Ec(EcKeyPair::from_private_key(extended_key)?))
    }

    /// Imports an RSA key pair from SPKI / PKCS#8 bodies.
    pub fn from_rsa_raw(public_key: &str, private_key: &str) -> CryptoResult<Self> {
        Ok(KeyPair::Rsa(RsaKeyPair::from_raw(public_key, private_key)?))
    }

    /// Restores an RSA key pair from its JSON export.
    pub fn from_rsa_export(exported: &str) -> CryptoResult<Self> {
        Ok(KeyPair::Rsa(RsaKeyPair::from_export(exported)?))
    }

    /// Builds a write-only EC key pair for a base64 public key.
    ///
    /// The result encrypts and wraps for that key; sign, decrypt, unwrap and
    /// export fail with [`CryptoError::WriteOnly`].
    pub fn from_public_key(public_key: &str) -> CryptoResult<Self> {
        let bytes = STANDARD.decode(public_key)?;
        Ok(KeyPair::Ec(EcKeyPair::write_only(&bytes)?))
    }

    /// Generates a fresh EC key pair from a new random mnemonic.
    pub fn generate_ec() -> CryptoResult<Self> {
        Self::from_mnemonic(KeyType::Ec, &generate_mnemonic()?)
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyPair::Ec(_) => KeyType::Ec,
            KeyPair::Rsa(_) => KeyType::Rsa,
        }
    }

    pub fn public_key(&self) -> &str {
        match self {
            KeyPair::Ec(kp) => kp.public_key(),
            KeyPair::Rsa(kp) => kp.public_key(),
        }
    }

    pub fn is_write_only(&self) -> bool {
        matches!(self, KeyPair::Ec(kp) if kp.provenance() == Provenance::WriteOnly)
    }

    /// EC: signs `message` as a 32-byte digest. RSA: signs SHA-256(message).
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        match self {
            KeyPair::Ec(kp) => kp.sign(message),
            KeyPair::Rsa(kp) => kp.sign(message),
        }
    }

    pub fn encrypt(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        match self {
            KeyPair::Ec(kp) => kp.encrypt(message),
            KeyPair::Rsa(kp) => kp.encrypt(message),
        }
    }

    pub fn decrypt(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        match self {
            KeyPair::Ec(kp) => kp.decrypt(message),
            KeyPair::Rsa(kp) => kp.decrypt(message),
        }
    }

    /// Wraps a resource key for this key pair's public key.
    pub fn wrap_key(&self, key: &ResourceKey) -> CryptoResult<String> {
        self.wrap_bytes(&key.export()?)
    }

    /// Wraps already-exported key material.
    pub fn wrap_bytes(&self, exported: &[u8]) -> CryptoResult<String> {
        Ok(STANDARD.encode(self.encrypt(exported)?))
    }

    /// Recovers a resource key wrapped for this key pair.
    pub fn unwrap_key(&self, wrapped: &str, key_type: WrappedKeyType) -> CryptoResult<ResourceKey> {
        let ciphertext = STANDARD
            .decode(wrapped)
            .map_err(|e| CryptoError::Wrap(format!("wrapped key is not base64: {e}")))?;
        let decrypted = self.decrypt(&ciphertext).map_err(|e| match e {
            CryptoError::WriteOnly(op) => CryptoError::WriteOnly(op),
            other => CryptoError::Wrap(other.to_string()),
        })?;

        match key_type {
            WrappedKeyType::Ec => {
                let extended_key = String::from_utf8(decrypted)
                    .map_err(|_| CryptoError::Wrap("wrapped EC key is not UTF-8".to_string()))?;
                let key_pair = Self::from_private_key(&extended_key)
                    .map_err(|e| CryptoError::Wrap(e.to_string()))?;
                Ok(ResourceKey::Asymmetric(key_pair))
            }
            WrappedKeyType::AesCbc => {
                let key = aes::import_key(&decrypted)
                    .map_err(|e| CryptoError::Wrap(e.to_string()))?;
                Ok(ResourceKey::Symmetric(key))
            }
        }
    }

    /// Encrypts `payload` for a third party known only by its public key.
    pub fn encrypt_with_public_key(
        key_type: KeyType,
        public_key: &str,
        payload: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        match key_type {
            KeyType::Ec => ec::encrypt(&ec::parse_public_key(public_key)?, payload),
            KeyType::Rsa => rsa::encrypt(&rsa::import_public_key(public_key)?, payload),
        }
    }

    /// Wraps a resource key for a third party known only by its public key.
    pub fn wrap_with_public_key(
        key_type: KeyType,
        public_key: &str,
        key: &ResourceKey,
    ) -> CryptoResult<String> {
        let encrypted = Self::encrypt_with_public_key(key_type, public_key, &key.export()?)?;
        Ok(STANDARD.encode(encrypted))
    }

    /// EC: `xprv` string. RSA: JSON bundle of public and private key bodies.
    pub fn export(&self) -> CryptoResult<String> {
        match self {
            KeyPair::Ec(kp) => kp.export(),
            KeyPair::Rsa(kp) => kp.export(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPair::Ec(kp) => kp.fmt(f),
            KeyPair::Rsa(kp) => kp.fmt(f),
        }
    }
}

impl From<EcKeyPair> for KeyPair {
    fn from(kp: EcKeyPair) -> Self {
        KeyPair::Ec(kp)
    }
}

impl From<RsaKeyPair> for KeyPair {
    fn from(kp: RsaKeyPair) -> Self {
        KeyPair::Rsa(kp)
    }
}
