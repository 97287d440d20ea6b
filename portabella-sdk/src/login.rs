//! Login key recovery.
//!
//! An account's key pair may have been derived under any of the historical
//! seed schemes. All candidates are derived in parallel on the blocking pool
//! and the first one whose public key matches the stored one wins.

use crate::error::{SdkError, SdkResult};
use futures::stream::{FuturesUnordered, StreamExt};
use portabella_crypto::{
    KeyPair, KeyType, SeedCandidate, SeedInput, get_possible_password_seeds, get_seed,
};
use tracing::{debug, info, warn};

/// Derives the key pair for a new account under the current seed scheme.
pub fn derive_key_pair(input: &SeedInput) -> SdkResult<KeyPair> {
    let seed = get_seed(input)?;
    Ok(KeyPair::from_seed(KeyType::Ec, &seed)?)
}

/// Recovers the key pair matching `stored_public_key` from login secrets.
pub async fn recover_key_pair(input: &SeedInput, stored_public_key: &str) -> SdkResult<KeyPair> {
    let candidates = get_possible_password_seeds(input)?;

    let mut pending: FuturesUnordered<_> = candidates
        .into_iter()
        .map(|candidate| {
            let derivation = candidate.derivation();
            let key_type = candidate.key_type();
            async move {
                let result = tokio::task::spawn_blocking(move || derive(&candidate)).await;
                (key_type, derivation, result)
            }
        })
        .collect();

    while let Some((key_type, derivation, result)) = pending.next().await {
        match result {
            Ok(Ok(key_pair)) if key_pair.public_key() == stored_public_key => {
                info!(%key_type, ?derivation, "recovered key pair");
                return Ok(key_pair);
            }
            Ok(Ok(_)) => debug!(%key_type, ?derivation, "candidate does not match"),
            Ok(Err(e)) => debug!(%key_type, ?derivation, error = %e, "candidate failed"),
            Err(e) => warn!(%key_type, ?derivation, error = %e, "candidate task failed"),
        }
    }

    Err(SdkError::MissingKey(
        "no derivation matches the stored public key".to_string(),
    ))
}

fn derive(candidate: &SeedCandidate) -> SdkResult<KeyPair> {
    let seed = candidate.derive()?;
    Ok(KeyPair::from_seed(candidate.key_type(), &seed)?)
}
