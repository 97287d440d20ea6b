//! Legacy RSA key pairs.
//!
//! Accounts created before the move to EC keys hold 2048-bit RSA keys
//! derived deterministically from their seed. New keys are never RSA; this
//! backend only exists so those accounts can still log in and read.

use crate::encoding::{decode_key_body, decode_uri, encode_uri, ensure_unarmored};
use crate::error::{CryptoError, CryptoResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Modulus size of legacy account keys.
pub const MODULUS_BITS: usize = 2048;

static BACKEND: OnceLock<RsaBackend> = OnceLock::new();

/// Process-wide RSA backend, initialized on the first RSA operation.
pub struct RsaBackend {
    modulus_bits: usize,
}

impl RsaBackend {
    pub fn get() -> &'static RsaBackend {
        BACKEND.get_or_init(|| {
            info!(modulus_bits = MODULUS_BITS, "initialising legacy RSA backend");
            RsaBackend {
                modulus_bits: MODULUS_BITS,
            }
        })
    }

    /// Whether any RSA path has run in this process.
    pub fn is_loaded() -> bool {
        BACKEND.get().is_some()
    }

    /// Deterministically generates the key pair belonging to `seed`.
    pub fn derive_from_seed(&self, seed: &[u8]) -> CryptoResult<RsaKeyPair> {
        let mut rng = ChaCha20Rng::from_seed(Sha256::digest(seed).into());
        let private = RsaPrivateKey::new(&mut rng, self.modulus_bits)
            .map_err(|e| CryptoError::KeyMaterial(format!("RSA key generation failed: {e}")))?;
        RsaKeyPair::from_private(private)
    }

    fn encryption_padding(&self) -> Oaep {
        Oaep::new::<Sha256>()
    }

    fn signature_scheme(&self) -> Pkcs1v15Sign {
        Pkcs1v15Sign::new::<Sha256>()
    }
}

/// Serialized form produced by [`RsaKeyPair::export`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsaExport {
    pub public_key: String,
    pub private_key: String,
}

/// An RSA key pair; the same private key decrypts (OAEP) and signs (PKCS#1 v1.5).
#[derive(Clone)]
pub struct RsaKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    encoded_public_key: String,
}

impl RsaKeyPair {
    /// Imports SPKI / PKCS#8 key bodies, armored or not.
    pub fn from_raw(public_key: &str, private_key: &str) -> CryptoResult<Self> {
        let public = import_public_key(public_key)?;
        let private = RsaPrivateKey::from_pkcs8_der(&decode_key_body(private_key)?)
            .map_err(|e| CryptoError::KeyMaterial(format!("invalid RSA private key: {e}")))?;

        Ok(Self {
            private,
            public,
            encoded_public_key: encode_uri(ensure_unarmored(public_key)),
        })
    }

    /// Restores a key pair from [`RsaKeyPair::export`] output.
    pub fn from_export(exported: &str) -> CryptoResult<Self> {
        let RsaExport {
            public_key,
            private_key,
        } = serde_json::from_str(exported)?;
        Self::from_raw(&public_key, &private_key)
    }

    fn from_private(private: RsaPrivateKey) -> CryptoResult<Self> {
        let public = private.to_public_key();
        let spki = public
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyMaterial(format!("RSA public key encoding failed: {e}")))?;
        Ok(Self {
            private,
            public,
            encoded_public_key: encode_uri(&STANDARD.encode(spki.as_bytes())),
        })
    }

    /// URI-escaped base64 SPKI body.
    pub fn public_key(&self) -> &str {
        &self.encoded_public_key
    }

    /// RSASSA-PKCS1-v1_5 over SHA-256(message).
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        let backend = RsaBackend::get();
        self.private
            .sign(backend.signature_scheme(), &Sha256::digest(message))
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    pub fn encrypt(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        encrypt(&self.public, message)
    }

    pub fn decrypt(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        let backend = RsaBackend::get();
        self.private
            .decrypt(backend.encryption_padding(), message)
            .map_err(|_| {
                CryptoError::Decryption("RSA-OAEP failed (wrong key or tampered data)".to_string())
            })
    }

    /// JSON bundle of the unescaped public key body and base64 PKCS#8 private key.
    pub fn export(&self) -> CryptoResult<String> {
        let pkcs8 = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyMaterial(format!("RSA private key encoding failed: {e}")))?;
        let exported = RsaExport {
            public_key: decode_uri(&self.encoded_public_key)?,
            private_key: STANDARD.encode(pkcs8.as_bytes()),
        };
        Ok(serde_json::to_string(&exported)?)
    }
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("public_key", &self.encoded_public_key)
            .finish_non_exhaustive()
    }
}

/// Parses an SPKI public key, armored, URI-escaped or bare.
pub fn import_public_key(text: &str) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(&decode_key_body(text)?)
        .map_err(|e| CryptoError::KeyMaterial(format!("invalid RSA public key: {e}")))
}

/// RSA-OAEP(SHA-256) encryption for `public`.
pub fn encrypt(public: &RsaPublicKey, message: &[u8]) -> CryptoResult<Vec<u8>> {
    let backend = RsaBackend::get();
    public
        .encrypt(&mut rand::rngs::OsRng, backend.encryption_padding(), message)
        .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP failed: {e}")))
}
