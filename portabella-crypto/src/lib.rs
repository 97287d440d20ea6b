//! Key management and field encryption for Portabella.
//!
//! The backend only ever stores ciphertext. Everything needed to turn it back
//! into plaintext lives here:
//!
//! - **Seeds**: derived from a BIP-39 mnemonic or an email + password pair,
//!   including the legacy schemes older accounts were created with
//! - **Key pairs**: secp256k1 BIP-32 nodes with ECIES, or legacy RSA
//! - **Resource keys**: AES-128-CBC keys (or, for older resources, whole EC
//!   key pairs) wrapped for every member under their public key
//! - **Field encryption**: selective encryption of named properties inside
//!   nested records
//!
//! # Key hierarchy
//!
//! 1. **User key pair**: derived from the user's seed. Never leaves the
//!    device; the backend only sees its public key.
//!
//! 2. **Resource key**: generated when a project or team is created, wrapped
//!    for the creator and later re-wrapped for each new member. Encrypts the
//!    resource's records field by field.
//!
//! Sharing a resource means wrapping its key for another public key; the
//! records themselves are never re-encrypted.

pub mod aes;
pub mod asymmetric;
pub mod encoding;
mod error;
pub mod fields;
mod key;
pub mod record;
pub mod seed;

pub use asymmetric::{KeyPair, KeyType, Provenance, WrappedKeyType};
pub use error::{CryptoError, CryptoResult};
pub use fields::{
    decrypt_fields, decrypt_fields_with_policy, encrypt_fields, encrypt_fields_with_policy,
    recursively_apply, FieldPolicy, FieldTransform,
};
pub use key::{ResourceKey, SymmetricKey, SYMMETRIC_KEY_SIZE};
pub use record::Record;
pub use seed::{
    generate_mnemonic, get_possible_password_seeds, get_seed, Seed, SeedCandidate,
    SeedDerivation, SeedInput,
};
