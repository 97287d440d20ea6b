use portabella_crypto::{
    KeyPair, KeyType, SeedDerivation, SeedInput, get_possible_password_seeds, get_seed,
};
use portabella_sdk::{SdkError, derive_key_pair, recover_key_pair};
use pretty_assertions::assert_eq;

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "correct horse battery staple";

#[test]
fn derived_key_pair_is_ec_and_deterministic() {
    let input = SeedInput::with_password(EMAIL, PASSWORD);
    let first = derive_key_pair(&input).unwrap();
    let second = derive_key_pair(&input).unwrap();

    assert_eq!(first.key_type(), KeyType::Ec);
    assert_eq!(first.public_key(), second.public_key());

    let expected = KeyPair::from_seed(KeyType::Ec, &get_seed(&input).unwrap()).unwrap();
    assert_eq!(first.public_key(), expected.public_key());
}

#[test]
fn missing_secrets_are_rejected() {
    let input = SeedInput {
        email: EMAIL.into(),
        password: None,
        mnemonic: None,
    };
    assert!(matches!(derive_key_pair(&input), Err(SdkError::Crypto(_))));
}

#[tokio::test]
async fn recovers_deprecated_sha256_ec_derivation() {
    let input = SeedInput::with_password(EMAIL, PASSWORD);
    let candidates = get_possible_password_seeds(&input).unwrap();
    let legacy = candidates
        .iter()
        .find(|c| c.key_type() == KeyType::Ec && c.derivation() == SeedDerivation::DeprecatedSha256)
        .unwrap();
    let stored = KeyPair::from_seed(KeyType::Ec, &legacy.derive().unwrap()).unwrap();
    assert_ne!(
        stored.public_key(),
        derive_key_pair(&input).unwrap().public_key()
    );

    let recovered = recover_key_pair(&input, stored.public_key()).await.unwrap();
    assert_eq!(recovered.key_type(), KeyType::Ec);
    assert_eq!(recovered.public_key(), stored.public_key());
}

#[tokio::test]
async fn recovers_current_password_derivation() {
    let input = SeedInput::with_password(EMAIL, PASSWORD);
    let stored = derive_key_pair(&input).unwrap();

    let recovered = recover_key_pair(&input, stored.public_key()).await.unwrap();
    assert_eq!(recovered.public_key(), stored.public_key());
    assert_eq!(recovered.export().unwrap(), stored.export().unwrap());
}

#[tokio::test]
async fn recovers_mnemonic_derivation() {
    let mnemonic = "legal winner thank year wave sausage worth useful legal winner thank yellow";
    let input = SeedInput::with_mnemonic(EMAIL, mnemonic);
    let stored = KeyPair::from_mnemonic(KeyType::Ec, mnemonic).unwrap();

    let recovered = recover_key_pair(&input, stored.public_key()).await.unwrap();
    assert_eq!(recovered.public_key(), stored.public_key());
}

#[tokio::test]
async fn wrong_password_matches_nothing() {
    let stored = derive_key_pair(&SeedInput::with_password(EMAIL, PASSWORD)).unwrap();
    let input = SeedInput::with_password(EMAIL, "Tr0ub4dor&3");

    let err = recover_key_pair(&input, stored.public_key()).await.unwrap_err();
    assert!(matches!(err, SdkError::MissingKey(_)));
}
