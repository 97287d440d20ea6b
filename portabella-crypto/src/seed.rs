//! Seed derivation from a mnemonic phrase or an email + password pair.
//!
//! Accounts have been created under several derivation schemes over time.
//! [`get_seed`] is the current one and the only one used for new accounts;
//! [`get_possible_password_seeds`] lists every scheme an existing account
//! may have been created with, most likely first, for login recovery.

use crate::asymmetric::KeyType;
use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Binary seed material.
pub type Seed = Zeroizing<Vec<u8>>;

/// PBKDF2 rounds for password seeds.
pub const PBKDF2_ROUNDS: u32 = 10_000;

const MNEMONIC_ROUNDS: u32 = 2048;
const MNEMONIC_SALT: &[u8] = b"mnemonic";
const MNEMONIC_SEED_SIZE: usize = 64;

/// Secret material a user logs in with.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SeedInput {
    pub email: String,
    pub password: Option<String>,
    pub mnemonic: Option<String>,
}

impl SeedInput {
    pub fn with_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Some(password.into()),
            mnemonic: None,
        }
    }

    pub fn with_mnemonic(email: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: None,
            mnemonic: Some(mnemonic.into()),
        }
    }

    /// The password, unless absent or empty.
    pub fn supplied_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// The mnemonic, unless absent or empty.
    pub fn supplied_mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref().filter(|m| !m.is_empty())
    }
}

impl fmt::Debug for SeedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedInput")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// How a candidate seed is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedDerivation {
    /// PBKDF2-HMAC-SHA256(password, email) with the given output length.
    Pbkdf2 { bytes: usize },
    /// SHA-256 of `email:password`. Unsalted; recovery only.
    DeprecatedSha256,
    /// Checksum-validated BIP-39 seed.
    Mnemonic,
    /// BIP-39 seed computed without checksum validation.
    UncheckedMnemonic,
}

/// One derivation to attempt during login recovery.
#[derive(Clone, Debug)]
pub struct SeedCandidate {
    key_type: KeyType,
    derivation: SeedDerivation,
    input: Arc<SeedInput>,
}

impl SeedCandidate {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn derivation(&self) -> SeedDerivation {
        self.derivation
    }

    /// Computes the seed. Deferred because PBKDF2 and RSA-bound seeds are slow.
    pub fn derive(&self) -> CryptoResult<Seed> {
        let email = &self.input.email;
        match self.derivation {
            SeedDerivation::Pbkdf2 { bytes } => {
                Ok(pbkdf2_seed(email, self.password()?, bytes))
            }
            SeedDerivation::DeprecatedSha256 => Ok(deprecated_seed(email, self.password()?)),
            SeedDerivation::Mnemonic => mnemonic_seed(self.mnemonic()?),
            SeedDerivation::UncheckedMnemonic => Ok(mnemonic_to_seed_unchecked(self.mnemonic()?)),
        }
    }

    fn password(&self) -> CryptoResult<&str> {
        self.input
            .supplied_password()
            .ok_or_else(|| CryptoError::KeyMaterial("no password provided".to_string()))
    }

    fn mnemonic(&self) -> CryptoResult<&str> {
        self.input
            .supplied_mnemonic()
            .ok_or_else(|| CryptoError::KeyMaterial("no mnemonic provided".to_string()))
    }
}

/// Derives the seed for the current scheme. A mnemonic takes precedence
/// over a password.
pub fn get_seed(input: &SeedInput) -> CryptoResult<Seed> {
    if let Some(mnemonic) = input.supplied_mnemonic() {
        return mnemonic_seed(mnemonic);
    }
    if let Some(password) = input.supplied_password() {
        return Ok(pbkdf2_seed(&input.email, password, 32));
    }
    Err(CryptoError::KeyMaterial(
        "neither password or mnemonic provided".to_string(),
    ))
}

/// Lists every derivation an existing account may use, most likely first.
pub fn get_possible_password_seeds(input: &SeedInput) -> CryptoResult<Vec<SeedCandidate>> {
    let plan: &[(KeyType, SeedDerivation)] = if input.supplied_mnemonic().is_some() {
        &[
            (KeyType::Ec, SeedDerivation::Mnemonic),
            (KeyType::Rsa, SeedDerivation::UncheckedMnemonic),
        ]
    } else if input.supplied_password().is_some() {
        &[
            // Accounts created after the move away from RSA.
            (KeyType::Ec, SeedDerivation::Pbkdf2 { bytes: 32 }),
            (KeyType::Ec, SeedDerivation::DeprecatedSha256),
            (KeyType::Rsa, SeedDerivation::DeprecatedSha256),
            (KeyType::Ec, SeedDerivation::Pbkdf2 { bytes: 64 }),
        ]
    } else {
        return Err(CryptoError::KeyMaterial("missing seed material".to_string()));
    };

    let input = Arc::new(input.clone());
    Ok(plan
        .iter()
        .map(|&(key_type, derivation)| SeedCandidate {
            key_type,
            derivation,
            input: Arc::clone(&input),
        })
        .collect())
}

/// Generates a 12-word BIP-39 mnemonic.
pub fn generate_mnemonic() -> CryptoResult<String> {
    let mut entropy = Zeroizing::new([0u8; 16]);
    rand::rngs::OsRng.fill_bytes(&mut entropy[..]);

    let mnemonic = bip39::Mnemonic::from_entropy(&entropy[..])
        .map_err(|e| CryptoError::KeyMaterial(format!("mnemonic generation failed: {e}")))?;

    Ok(mnemonic.to_string())
}

/// BIP-39 mnemonic-to-seed with an empty passphrase and no checksum check.
pub fn mnemonic_to_seed_unchecked(mnemonic: &str) -> Seed {
    let mut seed = Zeroizing::new(vec![0u8; MNEMONIC_SEED_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha512>(mnemonic.as_bytes(), MNEMONIC_SALT, MNEMONIC_ROUNDS, &mut seed);
    seed
}

fn mnemonic_seed(mnemonic: &str) -> CryptoResult<Seed> {
    let trimmed = mnemonic.trim();
    bip39::Mnemonic::parse_normalized(trimmed)
        .map_err(|e| CryptoError::KeyMaterial(format!("not a valid bip39 mnemonic: {e}")))?;
    Ok(mnemonic_to_seed_unchecked(trimmed))
}

fn pbkdf2_seed(email: &str, password: &str, bytes: usize) -> Seed {
    let mut seed = Zeroizing::new(vec![0u8; bytes]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), email.as_bytes(), PBKDF2_ROUNDS, &mut seed);
    seed
}

fn deprecated_seed(email: &str, password: &str) -> Seed {
    let material = Zeroizing::new(format!("{email}:{password}"));
    Zeroizing::new(Sha256::digest(material.as_bytes()).to_vec())
}
