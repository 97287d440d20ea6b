//! AES-128-CBC resource encryption.
//!
//! Every operation accepts a [`ResourceKey`]; when it holds a key pair the
//! call is delegated to the key pair's own asymmetric encryption, so callers
//! can treat "the project's current key" uniformly.
//!
//! Wire format for symmetric keys: `base64(iv) ":" base64(ciphertext)`.
//! Key pairs produce a single base64 string with no separator.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{ResourceKey, SYMMETRIC_KEY_SIZE, SymmetricKey};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Algorithm name stored alongside wrapped symmetric keys.
pub const ALGORITHM: &str = "AES-CBC";

/// Initialization vector size in bytes.
pub const IV_SIZE: usize = 16;

const SEPARATOR: char = ':';

/// Generates a fresh random 128-bit key.
pub fn generate() -> SymmetricKey {
    let mut bytes = [0u8; SYMMETRIC_KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SymmetricKey::from_bytes(bytes)
}

/// Returns the raw key bytes.
pub fn export_key(key: &SymmetricKey) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// Builds a key from raw bytes.
pub fn import_key(bytes: &[u8]) -> CryptoResult<SymmetricKey> {
    let bytes: [u8; SYMMETRIC_KEY_SIZE] =
        bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: SYMMETRIC_KEY_SIZE,
            actual: bytes.len(),
        })?;
    Ok(SymmetricKey::from_bytes(bytes))
}

/// Encrypts `payload`, returning `iv || ciphertext` for symmetric keys.
pub fn encrypt_raw(payload: &[u8], key: &ResourceKey) -> CryptoResult<Vec<u8>> {
    let key = match key {
        ResourceKey::Asymmetric(key_pair) => return key_pair.encrypt(payload),
        ResourceKey::Symmetric(key) => key,
    };

    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let cipher = Aes128CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CryptoError::Encryption(format!("cipher init failed: {e}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(payload);

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Encrypts `payload` into its string wire format.
pub fn encrypt(payload: &[u8], key: &ResourceKey) -> CryptoResult<String> {
    if let ResourceKey::Asymmetric(key_pair) = key {
        return Ok(STANDARD.encode(key_pair.encrypt(payload)?));
    }

    let raw = encrypt_raw(payload, key)?;
    let (iv, ciphertext) = raw.split_at(IV_SIZE);
    Ok(format!(
        "{}{SEPARATOR}{}",
        STANDARD.encode(iv),
        STANDARD.encode(ciphertext)
    ))
}

/// Decrypts the string wire format produced by [`encrypt`].
pub fn decrypt(ciphertext: &str, key: &ResourceKey) -> CryptoResult<Vec<u8>> {
    if let ResourceKey::Asymmetric(key_pair) = key {
        return key_pair.decrypt(&STANDARD.decode(ciphertext)?);
    }

    let mut parts = ciphertext.split(SEPARATOR);
    let (Some(iv), Some(body), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CryptoError::Decode(
            "expected exactly one ':' between iv and ciphertext".to_string(),
        ));
    };

    let mut raw = STANDARD.decode(iv)?;
    raw.extend(STANDARD.decode(body)?);
    decrypt_raw(&raw, key)
}

/// Decrypts `iv || ciphertext` produced by [`encrypt_raw`].
pub fn decrypt_raw(cipher: &[u8], key: &ResourceKey) -> CryptoResult<Vec<u8>> {
    let key = match key {
        ResourceKey::Asymmetric(key_pair) => return key_pair.decrypt(cipher),
        ResourceKey::Symmetric(key) => key,
    };

    if cipher.len() < IV_SIZE {
        return Err(CryptoError::Decryption(format!(
            "ciphertext too short: {} bytes",
            cipher.len()
        )));
    }
    let (iv, ciphertext) = cipher.split_at(IV_SIZE);

    Aes128CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::Decryption(format!("cipher init failed: {e}")))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| {
            CryptoError::Decryption("bad padding (wrong key or tampered data)".to_string())
        })
}
