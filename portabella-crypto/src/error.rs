//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in key management and field encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Missing or invalid seed, mnemonic or serialized key.
    #[error("invalid key material: {0}")]
    KeyMaterial(String),

    /// A private operation was attempted on a key pair built from a public key.
    #[error("key pair is write-only, cannot {0}")]
    WriteOnly(&'static str),

    #[error("key unwrap failed: {0}")]
    Wrap(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::Decode(format!("invalid base64: {err}"))
    }
}
