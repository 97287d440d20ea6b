use portabella_crypto::{KeyPair, KeyType, Record, ResourceKey, aes};
use portabella_sdk::{
    HttpTransport, Method, RequestSigner, SdkConfig, SdkError, Transport, UserClient,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn setup(server: &MockServer) -> HttpTransport {
    HttpTransport::new(SdkConfig::with_backend_url(server.uri())).unwrap()
}

#[tokio::test]
async fn ok_response_is_decoded_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/boards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "b1" }])))
        .mount(&server)
        .await;

    let result = setup(&server)
        .request("/me/boards", Method::Get, None)
        .await
        .unwrap();
    assert_eq!(result, Some(json!([{ "id": "b1" }])));
}

#[tokio::test]
async fn no_content_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/boards/b1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = setup(&server)
        .request("/boards/b1", Method::Delete, None)
        .await
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn empty_ok_body_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/boards/b1/board"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let result = setup(&server)
        .request("/boards/b1/board", Method::Put, Some(&json!({ "a": 1 })))
        .await
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn body_is_sent_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/boards/"))
        .and(body_json(json!({ "board": { "keyType": "EC" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "b2" })))
        .expect(1)
        .mount(&server)
        .await;

    let result = setup(&server)
        .request(
            "/boards/",
            Method::Post,
            Some(&json!({ "board": { "keyType": "EC" } })),
        )
        .await
        .unwrap();
    assert_eq!(result, Some(json!({ "id": "b2" })));
}

#[tokio::test]
async fn error_status_surfaces_body_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boards/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Board not found"))
        .mount(&server)
        .await;

    let err = setup(&server)
        .request("/boards/missing/", Method::Get, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Transport(ref text) if text == "Board not found"));
}

#[tokio::test]
async fn server_error_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = setup(&server)
        .request("/anything", Method::Get, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Transport(_)));
}

#[tokio::test]
async fn signer_attaches_challenge_headers() {
    let server = MockServer::start().await;
    let key_pair = Arc::new(
        KeyPair::from_mnemonic(
            KeyType::Ec,
            "legal winner thank year wave sausage worth useful legal winner thank yellow",
        )
        .unwrap(),
    );

    Mock::given(method("GET"))
        .and(path("/me/organisations"))
        .and(header("public-key", key_pair.public_key()))
        .and(header_exists("challenge"))
        .and(header_exists("signature"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let transport =
        setup(&server).with_signer(Arc::new(RequestSigner::new(Arc::clone(&key_pair), 240)));
    let result = transport
        .request("/me/organisations", Method::Get, None)
        .await
        .unwrap();
    assert_eq!(result, Some(json!([])));
}

#[test]
fn invalid_config_is_rejected() {
    let result = HttpTransport::new(SdkConfig::with_backend_url("ftp://example.com"));
    assert!(matches!(result, Err(SdkError::Config(_))));
}

#[tokio::test]
async fn user_client_decrypts_projects_over_http() {
    let server = MockServer::start().await;
    let user = Arc::new(
        KeyPair::from_mnemonic(
            KeyType::Ec,
            "legal winner thank year wave sausage worth useful legal winner thank yellow",
        )
        .unwrap(),
    );
    let project_key = ResourceKey::from(aes::generate());
    Mock::given(method("GET"))
        .and(path("/me/boards"))
        .and(header("public-key", user.public_key()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "b1",
            "name": aes::encrypt(b"Roadmap", &project_key).unwrap(),
            "encryptedKey": user.wrap_key(&project_key).unwrap(),
            "keyType": "AES-CBC",
        }])))
        .mount(&server)
        .await;

    let signer = Arc::new(RequestSigner::new(Arc::clone(&user), 240));
    let transport: Arc<dyn Transport> = Arc::new(setup(&server).with_signer(signer));
    let projects = UserClient::new(transport, Some(user)).get_projects().await.unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].get("name").and_then(Record::as_str), Some("Roadmap"));
}
