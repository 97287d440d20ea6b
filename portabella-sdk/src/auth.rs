//! Signed-challenge request authentication.
//!
//! The backend authenticates a request by its `public-key`, `challenge` and
//! `signature` headers: the challenge is the client's clock in milliseconds
//! and the signature is over SHA-256 of that decimal string. Signatures are
//! reused until they are `signature_ttl_secs` old.

use crate::error::SdkResult;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use portabella_crypto::KeyPair;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const PUBLIC_KEY_HEADER: &str = "public-key";
pub const CHALLENGE_HEADER: &str = "challenge";
pub const SIGNATURE_HEADER: &str = "signature";

/// A timestamp challenge and its signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedChallenge {
    pub challenge: String,
    pub signature: String,
    issued_at_ms: i64,
}

impl SignedChallenge {
    /// Signs the current time.
    pub fn generate(key_pair: &KeyPair) -> SdkResult<Self> {
        Self::generate_at(key_pair, Utc::now().timestamp_millis())
    }

    pub(crate) fn generate_at(key_pair: &KeyPair, now_ms: i64) -> SdkResult<Self> {
        let challenge = now_ms.to_string();
        let digest = Sha256::digest(challenge.as_bytes());
        let signature = STANDARD.encode(key_pair.sign(&digest)?);
        Ok(Self {
            challenge,
            signature,
            issued_at_ms: now_ms,
        })
    }

    pub fn issued_at_ms(&self) -> i64 {
        self.issued_at_ms
    }
}

/// Produces authentication headers for one key pair, re-signing when the
/// cached challenge expires.
pub struct RequestSigner {
    key_pair: Arc<KeyPair>,
    ttl_ms: i64,
    current: Mutex<Option<SignedChallenge>>,
}

impl RequestSigner {
    pub fn new(key_pair: Arc<KeyPair>, ttl_secs: u64) -> Self {
        Self {
            key_pair,
            ttl_ms: i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
            current: Mutex::new(None),
        }
    }

    pub fn key_pair(&self) -> &Arc<KeyPair> {
        &self.key_pair
    }

    /// The challenge to send now.
    pub async fn challenge(&self) -> SdkResult<SignedChallenge> {
        self.challenge_at(Utc::now().timestamp_millis()).await
    }

    pub(crate) async fn challenge_at(&self, now_ms: i64) -> SdkResult<SignedChallenge> {
        let mut current = self.current.lock().await;
        if let Some(signed) = current.as_ref() {
            if signed.issued_at_ms > now_ms - self.ttl_ms {
                return Ok(signed.clone());
            }
        }

        debug!("signing new request challenge");
        let signed = SignedChallenge::generate_at(&self.key_pair, now_ms)?;
        *current = Some(signed.clone());
        Ok(signed)
    }

    /// `public-key`, `challenge` and `signature` header pairs.
    pub async fn headers(&self) -> SdkResult<[(&'static str, String); 3]> {
        let signed = self.challenge().await?;
        Ok([
            (PUBLIC_KEY_HEADER, self.key_pair.public_key().to_string()),
            (CHALLENGE_HEADER, signed.challenge),
            (SIGNATURE_HEADER, signed.signature),
        ])
    }
}
