mod support;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use portabella_crypto::{KeyPair, Record, ResourceKey, WrappedKeyType, aes};
use portabella_sdk::{
    CreateProjectOptions, Method, ProjectClient, ProjectScope, SdkError, Transport,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use support::{FakeTransport, user_key_pair};

fn seal(text: &str, key: &ResourceKey) -> String {
    aes::encrypt(text.as_bytes(), key).unwrap()
}

fn open(ciphertext: &Value, key: &ResourceKey) -> String {
    String::from_utf8(aes::decrypt(ciphertext.as_str().unwrap(), key).unwrap()).unwrap()
}

/// A member's view of project `p1` encrypted under a fresh AES key.
fn member_project(user: &KeyPair, last_run: usize) -> (ResourceKey, Value) {
    let key = ResourceKey::from(aes::generate());
    let project = json!({
        "id": "p1",
        "membership": {
            "encryptedKey": user.wrap_key(&key).unwrap(),
            "keyType": "AES-CBC",
        },
        "board": {
            "name": seal("Roadmap", &key),
            "labels": seal(r#"[{"label":"bug","color":"red"}]"#, &key),
            "lastRunMigration": last_run,
        },
    });
    (key, project)
}

fn client(transport: &Arc<FakeTransport>, user: Option<KeyPair>) -> ProjectClient {
    let transport: Arc<dyn Transport> = transport.clone();
    ProjectClient::new(
        transport,
        user.map(Arc::new),
        ProjectScope::new("p1"),
    )
}

#[tokio::test]
async fn fetch_project_decrypts_and_runs_pending_migrations() {
    let user = user_key_pair();
    let (key, project) = member_project(&user, 0);
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Get, "/boards/p1/", project);

    let client = client(&transport, Some(user));
    let fetched = client.fetch_project().await.unwrap();

    assert_eq!(
        fetched.get("board").and_then(|b| b.get("name")).and_then(Record::as_str),
        Some("Roadmap")
    );

    let updates = transport.requests_to(Method::Put, "/boards/p1/board");
    assert_eq!(updates.len(), 3);

    let labels = &updates[0].body.as_ref().unwrap()["labelsV2"][0];
    assert_ne!(labels["label"], json!("bug"));
    assert_eq!(open(&labels["label"], &key), "bug");
    assert_eq!(open(&labels["color"], &key), "red");

    let checkpoints: Vec<_> = updates[1..]
        .iter()
        .map(|r| r.body.as_ref().unwrap()["lastRunMigration"].clone())
        .collect();
    assert_eq!(checkpoints, vec![json!(1), json!(2)]);
}

#[tokio::test]
async fn up_to_date_project_runs_no_migrations() {
    let user = user_key_pair();
    let (_, project) = member_project(&user, 2);
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Get, "/boards/p1/", project);

    client(&transport, Some(user)).fetch_project().await.unwrap();

    assert!(transport.requests_to(Method::Put, "/boards/p1/board").is_empty());
}

#[tokio::test]
async fn failed_migration_surfaces_its_index() {
    let user = user_key_pair();
    let (_, project) = member_project(&user, 0);
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Get, "/boards/p1/", project);
    transport.fail(Method::Put, "/boards/p1/board", "write rejected");

    let err = client(&transport, Some(user)).fetch_project().await.unwrap_err();
    assert!(matches!(err, SdkError::Migration { index: 0, .. }));
}

#[tokio::test]
async fn anonymous_reader_uses_published_private_key() {
    let project_key = KeyPair::generate_ec().unwrap();
    let key = ResourceKey::from(project_key.clone());
    let transport = Arc::new(FakeTransport::new());
    transport.respond(
        Method::Get,
        "/boards/p1/",
        json!({
            "membership": { "privateKey": project_key.export().unwrap() },
            "board": { "name": seal("Public plan", &key), "lastRunMigration": 2 },
        }),
    );

    let client = client(&transport, None);
    let fetched = client.fetch_project().await.unwrap();

    assert_eq!(
        fetched.get("board").and_then(|b| b.get("name")).and_then(Record::as_str),
        Some("Public plan")
    );
    let resolved = client.resource_key().await.unwrap();
    assert_eq!(
        resolved.as_key_pair().unwrap().public_key(),
        project_key.public_key()
    );
}

#[tokio::test]
async fn missing_membership_is_missing_key() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Get, "/boards/p1/", json!({ "board": {} }));
    let err = client(&transport, Some(user_key_pair()))
        .fetch_project()
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::MissingKey(_)));

    transport.respond(
        Method::Get,
        "/boards/p1/",
        json!({ "membership": { "role": "viewer" }, "board": {} }),
    );
    let err = client(&transport, Some(user_key_pair()))
        .fetch_project()
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::MissingKey(_)));
}

#[tokio::test]
async fn requests_before_loading_a_key_fail() {
    let transport = Arc::new(FakeTransport::new());
    let client = client(&transport, Some(user_key_pair()));

    let err = client.get("/columns").await.unwrap_err();
    assert!(matches!(err, SdkError::MissingKey(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn put_encrypts_body_and_decrypts_response() {
    let user = user_key_pair();
    let (key, project) = member_project(&user, 2);
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Get, "/boards/p1/", project);
    transport.respond(
        Method::Put,
        "/boards/p1/columns/c1",
        json!({ "id": "c1", "name": seal("Doing", &key) }),
    );

    let client = client(&transport, Some(user));
    client.fetch_project().await.unwrap();

    let mut column = Record::object();
    column.insert("name", "Doing");
    column.insert("position", 3i64);
    let response = client.update_column("c1", &column).await.unwrap().unwrap();

    assert_eq!(response.get("name").and_then(Record::as_str), Some("Doing"));

    let sent = transport.requests_to(Method::Put, "/boards/p1/columns/c1");
    let body = sent[0].body.as_ref().unwrap();
    assert_eq!(body["position"], json!(3));
    assert_ne!(body["name"], json!("Doing"));
    assert_eq!(open(&body["name"], &key), "Doing");
}

#[tokio::test]
async fn public_key_grants_write_only_access() {
    let project_key = KeyPair::generate_ec().unwrap();
    let transport = Arc::new(FakeTransport::new());
    transport.respond(
        Method::Post,
        "/boards/p1/public-key",
        json!(project_key.public_key()),
    );

    let client = client(&transport, None);
    client.fetch_public_key().await.unwrap();

    let key = client.resource_key().await.unwrap();
    assert!(key.as_key_pair().unwrap().is_write_only());

    let mut card = Record::object();
    card.insert("title", "Feedback from a visitor");
    assert!(client.post("/cards", &card).await.unwrap().is_none());

    let sent = transport.requests_to(Method::Post, "/boards/p1/cards");
    let title = &sent[0].body.as_ref().unwrap()["title"];
    assert_eq!(
        open(title, &ResourceKey::from(project_key)),
        "Feedback from a visitor"
    );
}

#[tokio::test]
async fn public_key_must_be_a_string() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Post, "/boards/p1/public-key", json!({ "key": 1 }));
    let err = client(&transport, None).fetch_public_key().await.unwrap_err();
    assert!(matches!(err, SdkError::InvalidResponse(_)));
}

#[tokio::test]
async fn create_private_aes_project() {
    let creator = user_key_pair();
    let transport = FakeTransport::new();
    let input = Record::from(json!({ "board": { "name": "Launch" } }));
    let options = CreateProjectOptions {
        key_type: WrappedKeyType::AesCbc,
        ..Default::default()
    };

    ProjectClient::create_project(&transport, &creator, &input, &options)
        .await
        .unwrap();

    let sent = transport.requests_to(Method::Post, "/boards/");
    assert_eq!(sent.len(), 1);
    let board = &sent[0].body.as_ref().unwrap()["board"];

    assert_eq!(board["keyType"], json!("AES-CBC"));
    assert_eq!(board["lastRunMigration"], json!(2));
    assert!(board.get("publicKey").is_none());
    assert!(board.get("privateKey").is_none());

    let key = creator
        .unwrap_key(board["encryptedKey"].as_str().unwrap(), WrappedKeyType::AesCbc)
        .unwrap();
    assert_eq!(open(&board["name"], &key), "Launch");
}

#[tokio::test]
async fn create_public_ec_project_in_team() {
    let creator = user_key_pair();
    let transport = FakeTransport::new();
    let input = Record::from(json!({ "public": true, "board": { "name": "Open roadmap" } }));
    let options = CreateProjectOptions {
        organisation_id: Some("o1".into()),
        ..Default::default()
    };

    ProjectClient::create_project(&transport, &creator, &input, &options)
        .await
        .unwrap();

    let sent = transport.requests_to(Method::Post, "/organisations/o1/boards/");
    let board = &sent[0].body.as_ref().unwrap()["board"];
    assert_eq!(board["keyType"], json!("EC"));

    let published = KeyPair::from_private_key(board["privateKey"].as_str().unwrap()).unwrap();
    assert_eq!(board["publicKey"], json!(published.public_key()));

    let wrapped = creator
        .unwrap_key(board["encryptedKey"].as_str().unwrap(), WrappedKeyType::Ec)
        .unwrap();
    assert_eq!(
        wrapped.as_key_pair().unwrap().public_key(),
        published.public_key()
    );
    assert_eq!(open(&board["name"], &wrapped), "Open roadmap");
}

#[tokio::test]
async fn make_public_publishes_raw_aes_key() {
    let user = user_key_pair();
    let (key, project) = member_project(&user, 2);
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Get, "/boards/p1/", project);

    let client = client(&transport, Some(user));
    client.fetch_project().await.unwrap();
    client.make_public().await.unwrap();

    let sent = transport.requests_to(Method::Put, "/boards/p1/make-public");
    let private_key = sent[0].body.as_ref().unwrap()["privateKey"].as_str().unwrap().to_string();
    let ResourceKey::Symmetric(key) = key else {
        panic!("expected a symmetric key");
    };
    assert_eq!(STANDARD.decode(private_key).unwrap(), key.as_bytes().to_vec());

    client.make_private().await.unwrap();
    assert_eq!(transport.requests_to(Method::Get, "/boards/p1/make-private").len(), 1);
}

#[tokio::test]
async fn team_project_paths_are_scoped() {
    let user = user_key_pair();
    let (_, project) = member_project(&user, 2);
    let transport = Arc::new(FakeTransport::new());
    transport.respond(Method::Get, "/organisations/o1/boards/p1/", project);

    let shared: Arc<dyn Transport> = transport.clone();
    let client = ProjectClient::new(
        shared,
        Some(Arc::new(user)),
        ProjectScope::new("p1").in_organisation("o1"),
    );
    client.fetch_project().await.unwrap();
    client.del("/cards/k1").await.unwrap();

    assert_eq!(
        transport
            .requests_to(Method::Delete, "/organisations/o1/boards/p1/cards/k1")
            .len(),
        1
    );
}
