//! Selective encryption of named fields inside nested records.
//!
//! Only values under allow-listed property names are touched; everything
//! else is walked recursively and passed through. Encryption is all or
//! nothing. Decryption is best effort: a field that fails is logged and left
//! as stored so the rest of the record stays usable.

use crate::aes;
use crate::error::CryptoResult;
use crate::key::ResourceKey;
use crate::record::Record;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

const ENCRYPTED_PROPERTIES: &[&str] = &[
    "name",
    "title",
    "description",
    "hex",
    "text",
    "payload",
    "encryptedMetadata",
    "label",
    "color",
    "priority",
    "body",
    "token",
];

const JSON_PROPERTIES: &[&str] = &["payload", "encryptedMetadata"];

const DATE_PROPERTIES: &[&str] = &[
    "createdAt",
    "updatedAt",
    "completedAt",
    "startAt",
    "endAt",
    "archivedAt",
    "recursNext",
];

/// Which property names are encrypted, and how their plaintext is typed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Values under these names are encrypted.
    pub encrypted: HashSet<String>,
    /// Encrypted values under these names are JSON-serialized first.
    pub json: HashSet<String>,
    /// Values under these names are re-hydrated to dates on decrypt.
    pub dates: HashSet<String>,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            encrypted: to_set(ENCRYPTED_PROPERTIES),
            json: to_set(JSON_PROPERTIES),
            dates: to_set(DATE_PROPERTIES),
        }
    }
}

impl FieldPolicy {
    pub fn is_encrypted(&self, name: &str) -> bool {
        self.encrypted.contains(name)
    }

    pub fn is_json(&self, name: &str) -> bool {
        self.json.contains(name)
    }

    pub fn is_date(&self, name: &str) -> bool {
        self.dates.contains(name)
    }
}

fn to_set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A string-to-string cipher step.
pub type FieldFn<'a> = &'a dyn Fn(&str) -> CryptoResult<String>;

/// The operations applied to allow-listed values. Either may be absent.
#[derive(Clone, Copy, Default)]
pub struct FieldTransform<'a> {
    pub encrypt: Option<FieldFn<'a>>,
    pub decrypt: Option<FieldFn<'a>>,
}

/// Walks `data` and applies `transform` to every allow-listed value.
///
/// Errors only come from `transform.encrypt`.
pub fn recursively_apply(
    data: &Record,
    policy: &FieldPolicy,
    transform: &FieldTransform<'_>,
) -> CryptoResult<Record> {
    match data {
        Record::Array(items) => items
            .iter()
            .map(|item| recursively_apply(item, policy, transform))
            .collect::<CryptoResult<Vec<_>>>()
            .map(Record::Array),
        Record::Object(map) => {
            let mut out = BTreeMap::new();
            for (name, value) in map {
                let applied = if policy.is_encrypted(name) && !value.is_null() {
                    apply_to_property(name, value, policy, transform)?
                } else if let Some(date) = rehydrate_date(name, value, policy, transform) {
                    date
                } else {
                    recursively_apply(value, policy, transform)?
                };
                out.insert(name.clone(), applied);
            }
            Ok(Record::Object(out))
        }
        primitive => Ok(primitive.clone()),
    }
}

fn apply_to_property(
    name: &str,
    value: &Record,
    policy: &FieldPolicy,
    transform: &FieldTransform<'_>,
) -> CryptoResult<Record> {
    let mut value = value.clone();

    if let Some(encrypt) = transform.encrypt {
        let plaintext = match &value {
            Record::String(s) if !policy.is_json(name) => s.clone(),
            other => serde_json::to_string(other)?,
        };
        value = Record::String(encrypt(&plaintext)?);
    }

    if let Some(decrypt) = transform.decrypt {
        value = decrypt_property(name, value, policy, decrypt);
    }

    Ok(value)
}

fn decrypt_property(name: &str, value: Record, policy: &FieldPolicy, decrypt: FieldFn<'_>) -> Record {
    let ciphertext = match &value {
        Record::String(s) if !s.is_empty() => s,
        Record::String(_) => return value,
        _ => {
            warn!(property = name, "encrypted property is not a string; left as stored");
            return value;
        }
    };

    let plaintext = match decrypt(ciphertext) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            warn!(property = name, error = %e, "failed to decrypt property");
            return value;
        }
    };

    if policy.is_json(name) {
        return match serde_json::from_str::<serde_json::Value>(&plaintext) {
            Ok(parsed) => Record::from(parsed),
            Err(e) => {
                warn!(property = name, error = %e, "decrypted property is not valid JSON");
                Record::String(plaintext)
            }
        };
    }

    if policy.is_date(name) {
        if let Some(date) = Record::parse_date(&plaintext) {
            return date;
        }
    }

    Record::String(plaintext)
}

fn rehydrate_date(
    name: &str,
    value: &Record,
    policy: &FieldPolicy,
    transform: &FieldTransform<'_>,
) -> Option<Record> {
    if transform.decrypt.is_none() || !policy.is_date(name) {
        return None;
    }
    value.as_str().and_then(Record::parse_date)
}

/// Encrypts the allow-listed fields of `data` under `key`.
pub fn encrypt_fields(data: &Record, key: &ResourceKey) -> CryptoResult<Record> {
    encrypt_fields_with_policy(data, key, &FieldPolicy::default())
}

/// Decrypts the allow-listed fields of `data` under `key`.
pub fn decrypt_fields(data: &Record, key: &ResourceKey) -> Record {
    decrypt_fields_with_policy(data, key, &FieldPolicy::default())
}

pub fn encrypt_fields_with_policy(
    data: &Record,
    key: &ResourceKey,
    policy: &FieldPolicy,
) -> CryptoResult<Record> {
    let encrypt = |plaintext: &str| aes::encrypt(plaintext.as_bytes(), key);
    let transform = FieldTransform {
        encrypt: Some(&encrypt),
        decrypt: None,
    };
    recursively_apply(data, policy, &transform)
}

pub fn decrypt_fields_with_policy(data: &Record, key: &ResourceKey, policy: &FieldPolicy) -> Record {
    let decrypt = |ciphertext: &str| -> CryptoResult<String> {
        let plaintext = aes::decrypt(ciphertext, key)?;
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    };
    let transform = FieldTransform {
        encrypt: None,
        decrypt: Some(&decrypt),
    };
    // Without an encrypt step the walk cannot fail.
    recursively_apply(data, policy, &transform).unwrap_or_else(|_| data.clone())
}
