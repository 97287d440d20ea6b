//! secp256k1 key pairs: BIP-32 nodes, ECIES and prehash signatures.
//!
//! The ECIES layout matches eciesjs so existing ciphertexts stay readable:
//!
//! ```text
//! ephemeral public key (65, uncompressed) || nonce (16) || tag (16) || ciphertext
//! ```
//!
//! The AES-256-GCM key is HKDF-SHA256 over the ephemeral public key followed
//! by the uncompressed shared point, with no salt and no info.

use crate::error::{CryptoError, CryptoResult};
use crate::seed::mnemonic_to_seed_unchecked;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{AesGcm, aes::Aes256};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bip32::{Prefix, XPrv};
use hkdf::Hkdf;
use k256::ecdsa::Signature;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::elliptic_curve::sec1::{EncodedPoint, ToEncodedPoint};
use k256::{NonZeroScalar, PublicKey, Secp256k1, SecretKey};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Mnemonic of the throwaway node behind every write-only key pair.
///
/// Publicly known; write-only pairs never use its private half.
pub const WRITE_ONLY_MNEMONIC: &str =
    "verify pole torch letter thumb payment soda speed degree memory angle private";

const UNCOMPRESSED_KEY_SIZE: usize = 65;
const NONCE_SIZE: usize = 16;
const TAG_SIZE: usize = 16;
const HEADER_SIZE: usize = UNCOMPRESSED_KEY_SIZE + NONCE_SIZE + TAG_SIZE;
const DIGEST_SIZE: usize = 32;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Where a key pair's key material came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Derived from a seed, mnemonic or extended private key.
    Derived,
    /// Built from someone else's public key; can only encrypt for it.
    WriteOnly,
}

/// An EC key pair backed by a BIP-32 node.
#[derive(Clone)]
pub struct EcKeyPair {
    node: XPrv,
    public_key: PublicKey,
    encoded_public_key: String,
    provenance: Provenance,
}

impl EcKeyPair {
    /// Derives the BIP-32 master node for `seed` (16 to 64 bytes).
    pub fn from_seed(seed: &[u8]) -> CryptoResult<Self> {
        let node = XPrv::new(seed)
            .map_err(|e| CryptoError::KeyMaterial(format!("invalid seed: {e}")))?;
        Ok(Self::from_node(node))
    }

    /// Derives the master node from a mnemonic without checksum validation.
    pub fn from_mnemonic(mnemonic: &str) -> CryptoResult<Self> {
        Self::from_seed(&mnemonic_to_seed_unchecked(mnemonic))
    }

    /// Restores a node from its `xprv` serialization.
    pub fn from_private_key(extended_key: &str) -> CryptoResult<Self> {
        let node = extended_key
            .parse::<XPrv>()
            .map_err(|e| CryptoError::KeyMaterial(format!("invalid extended private key: {e}")))?;
        Ok(Self::from_node(node))
    }

    /// Builds a key pair that can only encrypt for `public_key`.
    ///
    /// The node comes from [`WRITE_ONLY_MNEMONIC`]; its public half is
    /// replaced by the caller's key and its private half is never used.
    pub fn write_only(public_key: &[u8]) -> CryptoResult<Self> {
        let parsed = PublicKey::from_sec1_bytes(public_key)
            .map_err(|_| CryptoError::KeyMaterial("invalid EC public key".to_string()))?;
        let throwaway = Self::from_mnemonic(WRITE_ONLY_MNEMONIC)?;

        Ok(Self {
            node: throwaway.node,
            public_key: parsed,
            encoded_public_key: STANDARD.encode(public_key),
            provenance: Provenance::WriteOnly,
        })
    }

    fn from_node(node: XPrv) -> Self {
        let public_key = PublicKey::from(node.private_key().verifying_key());
        let encoded_public_key = STANDARD.encode(public_key.to_encoded_point(true).as_bytes());
        Self {
            node,
            public_key,
            encoded_public_key,
            provenance: Provenance::Derived,
        }
    }

    /// Base64 SEC1 public key.
    pub fn public_key(&self) -> &str {
        &self.encoded_public_key
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Signs a 32-byte digest, returning the 64-byte compact signature.
    pub fn sign(&self, digest: &[u8]) -> CryptoResult<Vec<u8>> {
        let node = self.private_node("sign")?;
        if digest.len() != DIGEST_SIZE {
            return Err(CryptoError::Signing(format!(
                "expected a {DIGEST_SIZE}-byte digest, got {} bytes",
                digest.len()
            )));
        }
        let signature: Signature = node
            .private_key()
            .sign_prehash(digest)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    pub fn encrypt(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        encrypt(&self.public_key, message)
    }

    pub fn decrypt(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        let node = self.private_node("decrypt")?;
        decrypt(node.private_key().as_nonzero_scalar(), message)
    }

    /// Serializes the node as an `xprv` extended private key.
    pub fn export(&self) -> CryptoResult<String> {
        let node = self.private_node("export")?;
        Ok(node.to_string(Prefix::XPRV).as_str().to_owned())
    }

    fn private_node(&self, operation: &'static str) -> CryptoResult<&XPrv> {
        match self.provenance {
            Provenance::Derived => Ok(&self.node),
            Provenance::WriteOnly => Err(CryptoError::WriteOnly(operation)),
        }
    }
}

impl fmt::Debug for EcKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKeyPair")
            .field("public_key", &self.encoded_public_key)
            .field("provenance", &self.provenance)
            .finish_non_exhaustive()
    }
}

/// Parses a base64 SEC1 public key.
pub fn parse_public_key(encoded: &str) -> CryptoResult<PublicKey> {
    let bytes = STANDARD.decode(encoded)?;
    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|_| CryptoError::KeyMaterial("invalid EC public key".to_string()))
}

/// ECIES-encrypts `message` for `receiver`.
pub fn encrypt(receiver: &PublicKey, message: &[u8]) -> CryptoResult<Vec<u8>> {
    let ephemeral = SecretKey::random(&mut rand::rngs::OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(false);
    let shared = shared_point(receiver, &ephemeral.to_nonzero_scalar());
    let cipher = session_cipher(ephemeral_public.as_bytes(), &shared)?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let mut body = message.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), b"", &mut body)
        .map_err(|e| CryptoError::Encryption(format!("ECIES seal failed: {e}")))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypts an ECIES payload with the receiver's secret scalar.
pub fn decrypt(secret: &NonZeroScalar, message: &[u8]) -> CryptoResult<Vec<u8>> {
    if message.len() < HEADER_SIZE {
        return Err(CryptoError::Decryption(format!(
            "ECIES payload too short: {} bytes",
            message.len()
        )));
    }

    let (ephemeral, rest) = message.split_at(UNCOMPRESSED_KEY_SIZE);
    let (nonce, rest) = rest.split_at(NONCE_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let ephemeral_public = PublicKey::from_sec1_bytes(ephemeral)
        .map_err(|_| CryptoError::Decryption("invalid ephemeral public key".to_string()))?;
    let shared = shared_point(&ephemeral_public, secret);
    let cipher = session_cipher(ephemeral, &shared)?;

    let mut body = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            &mut body,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| {
            CryptoError::Decryption("ECIES open failed (wrong key or tampered data)".to_string())
        })?;
    Ok(body)
}

fn shared_point(public: &PublicKey, secret: &NonZeroScalar) -> EncodedPoint<Secp256k1> {
    let scalar: k256::Scalar = **secret;
    (public.to_projective() * scalar)
        .to_affine()
        .to_encoded_point(false)
}

fn session_cipher(
    ephemeral_public: &[u8],
    shared: &EncodedPoint<Secp256k1>,
) -> CryptoResult<Aes256Gcm16> {
    let mut master = Zeroizing::new(Vec::with_capacity(2 * UNCOMPRESSED_KEY_SIZE));
    master.extend_from_slice(ephemeral_public);
    master.extend_from_slice(shared.as_bytes());

    let mut key = Zeroizing::new([0u8; 32]);
    Hkdf::<Sha256>::new(None, &master)
        .expand(&[], &mut key[..])
        .map_err(|e| CryptoError::Encryption(format!("HKDF expand failed: {e}")))?;

    Aes256Gcm16::new_from_slice(&key[..])
        .map_err(|e| CryptoError::Encryption(format!("cipher init failed: {e}")))
}
