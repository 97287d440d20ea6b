//! Encrypted access to a single project (board).
//!
//! A project's records are encrypted under its resource key. Members hold
//! that key wrapped for their own public key (`encryptedKey`); public
//! projects additionally expose it unwrapped (`privateKey`). Every request
//! made through [`ProjectClient`] encrypts its body and decrypts its response
//! with the resolved key.

use crate::error::{SdkError, SdkResult};
use crate::migrations::{
    CHECKPOINT_FIELD, Migration, MigrationStore, default_migrations, last_run_migration,
    run_migrations,
};
use crate::transport::{Method, Transport};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use portabella_crypto::{
    KeyPair, Record, ResourceKey, WrappedKeyType, aes, decrypt_fields, encrypt_fields,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Resolves the key a resource's records are encrypted under.
///
/// A `private_key` (public resources) is imported directly: an `xprv` string
/// for `EC`, base64 raw bytes for `AES-CBC`. An `encrypted_key` unwrapped
/// with the caller's key pair takes precedence when both are available.
pub fn resolve_resource_key(
    user_key: Option<&KeyPair>,
    encrypted_key: Option<&str>,
    key_type: WrappedKeyType,
    private_key: Option<&str>,
) -> SdkResult<ResourceKey> {
    if let (Some(encrypted_key), Some(user_key)) = (encrypted_key, user_key) {
        debug!(key_type = key_type.as_str(), "unwrapping resource key");
        return Ok(user_key.unwrap_key(encrypted_key, key_type)?);
    }

    if let Some(private_key) = private_key {
        debug!(key_type = key_type.as_str(), "importing public resource key");
        return match key_type {
            WrappedKeyType::Ec => Ok(ResourceKey::from(KeyPair::from_private_key(private_key)?)),
            WrappedKeyType::AesCbc => {
                let bytes = STANDARD.decode(private_key).map_err(|e| {
                    SdkError::InvalidResponse(format!("privateKey is not base64: {e}"))
                })?;
                Ok(ResourceKey::from(aes::import_key(&bytes)?))
            }
        };
    }

    Err(SdkError::MissingKey(
        "no key found for this resource".to_string(),
    ))
}

/// Reads `keyType` from a resource or membership record. Older records
/// predate the field and are always EC.
pub fn wrapped_key_type(record: &Record) -> SdkResult<WrappedKeyType> {
    match record.get("keyType") {
        None | Some(Record::Null) => Ok(WrappedKeyType::Ec),
        Some(value) => Ok(serde_json::from_value(value.to_value())?),
    }
}

/// Resolves the key of a listed resource using its own key-wrap fields.
pub(crate) fn resolve_listed_key(user_key: Option<&KeyPair>, record: &Record) -> SdkResult<ResourceKey> {
    resolve_resource_key(
        user_key,
        record.get("encryptedKey").and_then(Record::as_str),
        wrapped_key_type(record)?,
        record.get("privateKey").and_then(Record::as_str),
    )
}

/// Sends `body` encrypted under `key` and decrypts the response.
pub(crate) async fn encrypted_request(
    transport: &dyn Transport,
    path: &str,
    method: Method,
    body: Option<&Record>,
    key: &ResourceKey,
) -> SdkResult<Option<Record>> {
    let body = body
        .map(|b| encrypt_fields(b, key).map(Value::from))
        .transpose()?;
    let response = transport.request(path, method, body.as_ref()).await?;
    Ok(response.map(|value| decrypt_fields(&Record::from(value), key)))
}

/// Which project a client talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectScope {
    pub project_id: String,
    pub organisation_id: Option<String>,
}

impl ProjectScope {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            organisation_id: None,
        }
    }

    pub fn in_organisation(mut self, organisation_id: impl Into<String>) -> Self {
        self.organisation_id = Some(organisation_id.into());
        self
    }

    /// `/boards/{id}`, or `/organisations/{org}/boards/{id}` for team projects.
    pub fn base_path(&self) -> String {
        match &self.organisation_id {
            Some(org) => format!("/organisations/{org}/boards/{}", self.project_id),
            None => format!("/boards/{}", self.project_id),
        }
    }
}

/// Options for [`ProjectClient::create_project`].
#[derive(Clone, Debug)]
pub struct CreateProjectOptions {
    /// `EC` (default) or `AES-CBC` resource key.
    pub key_type: WrappedKeyType,
    /// Creates the project inside this team.
    pub organisation_id: Option<String>,
    /// Checkpoint stamped on the new board; all known migrations are
    /// already satisfied by a fresh project.
    pub migration_count: usize,
}

impl Default for CreateProjectOptions {
    fn default() -> Self {
        Self {
            key_type: WrappedKeyType::Ec,
            organisation_id: None,
            migration_count: default_migrations().len(),
        }
    }
}

/// Client for one project.
pub struct ProjectClient {
    transport: Arc<dyn Transport>,
    user_key: Option<Arc<KeyPair>>,
    scope: ProjectScope,
    resource_key: RwLock<Option<Arc<ResourceKey>>>,
    migrations: Vec<Box<dyn Migration>>,
}

impl ProjectClient {
    /// `user_key` is `None` for anonymous access to public projects.
    pub fn new(
        transport: Arc<dyn Transport>,
        user_key: Option<Arc<KeyPair>>,
        scope: ProjectScope,
    ) -> Self {
        Self {
            transport,
            user_key,
            scope,
            resource_key: RwLock::new(None),
            migrations: default_migrations(),
        }
    }

    /// Replaces the migrations run by [`ProjectClient::fetch_project`].
    pub fn with_migrations(mut self, migrations: Vec<Box<dyn Migration>>) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }

    /// The resolved resource key, once loaded.
    pub async fn resource_key(&self) -> Option<Arc<ResourceKey>> {
        self.resource_key.read().await.clone()
    }

    async fn require_key(&self) -> SdkResult<Arc<ResourceKey>> {
        self.resource_key().await.ok_or_else(|| {
            SdkError::MissingKey(
                "no key for this project, fetch the project or its public key first".to_string(),
            )
        })
    }

    async fn set_key(&self, key: ResourceKey) -> Arc<ResourceKey> {
        let key = Arc::new(key);
        *self.resource_key.write().await = Some(Arc::clone(&key));
        key
    }

    async fn project_request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> SdkResult<Option<Value>> {
        let full_path = format!("{}{path}", self.scope.base_path());
        self.transport.request(&full_path, method, body).await
    }

    async fn encrypted(
        &self,
        path: &str,
        method: Method,
        body: Option<&Record>,
    ) -> SdkResult<Option<Record>> {
        let key = self.require_key().await?;
        let full_path = format!("{}{path}", self.scope.base_path());
        encrypted_request(self.transport.as_ref(), &full_path, method, body, &key).await
    }

    /// Loads the project, resolves its key and brings its data up to date.
    pub async fn fetch_project(&self) -> SdkResult<Record> {
        let project = self
            .project_request("/", Method::Get, None)
            .await?
            .map(Record::from)
            .ok_or_else(|| SdkError::InvalidResponse("empty project response".to_string()))?;

        let membership = project
            .get("membership")
            .filter(|m| !m.is_null())
            .ok_or_else(|| SdkError::MissingKey("no membership for this board".to_string()))?;

        let encrypted_key = membership.get("encryptedKey").and_then(Record::as_str);
        let private_key = membership.get("privateKey").and_then(Record::as_str);
        if encrypted_key.is_none() && private_key.is_none() {
            return Err(SdkError::MissingKey(
                "no key found for this board".to_string(),
            ));
        }

        let key = resolve_resource_key(
            self.user_key.as_deref(),
            encrypted_key,
            wrapped_key_type(membership)?,
            private_key,
        )?;
        let key = self.set_key(key).await;

        let project = decrypt_fields(&project, &key);
        let last_run = last_run_migration(&project);
        if last_run < self.migrations.len() {
            run_migrations(&project, last_run, &self.migrations, &key, self).await?;
        }
        Ok(project)
    }

    /// Primes the client for writing with the project's public key only.
    pub async fn fetch_public_key(&self) -> SdkResult<()> {
        let public_key = self
            .project_request("/public-key", Method::Post, None)
            .await?
            .ok_or_else(|| SdkError::InvalidResponse("unable to fetch public key".to_string()))?;
        let public_key = public_key.as_str().ok_or_else(|| {
            SdkError::InvalidResponse("public key response is not a string".to_string())
        })?;

        self.set_key(ResourceKey::from(KeyPair::from_public_key(public_key)?))
            .await;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> SdkResult<Option<Record>> {
        self.encrypted(path, Method::Get, None).await
    }

    pub async fn put(&self, path: &str, data: &Record) -> SdkResult<Option<Record>> {
        self.encrypted(path, Method::Put, Some(data)).await
    }

    pub async fn post(&self, path: &str, data: &Record) -> SdkResult<Option<Record>> {
        self.encrypted(path, Method::Post, Some(data)).await
    }

    pub async fn del(&self, path: &str) -> SdkResult<Option<Record>> {
        self.encrypted(path, Method::Delete, None).await
    }

    pub async fn update_board(&self, data: &Record) -> SdkResult<Option<Record>> {
        self.put("/board", data).await
    }

    pub async fn update_column(&self, column_id: &str, data: &Record) -> SdkResult<Option<Record>> {
        self.put(&format!("/columns/{column_id}"), data).await
    }

    /// Publishes the unwrapped project key so anyone with the link can read.
    pub async fn make_public(&self) -> SdkResult<Option<Record>> {
        let key = self.require_key().await?;
        let private_key = match key.as_ref() {
            ResourceKey::Asymmetric(key_pair) => key_pair.export()?,
            ResourceKey::Symmetric(key) => STANDARD.encode(aes::export_key(key)),
        };

        let mut body = Record::object();
        body.insert("privateKey", private_key);
        self.put("/make-public", &body).await
    }

    pub async fn make_private(&self) -> SdkResult<Option<Record>> {
        self.get("/make-private").await
    }

    /// Creates a project owned by `creator`.
    ///
    /// Generates the resource key, wraps it for the creator and stamps the
    /// key-wrap fields on `input.board` before encrypting and posting. When
    /// `input.public` is true the unwrapped key is included as `privateKey`.
    pub async fn create_project(
        transport: &dyn Transport,
        creator: &KeyPair,
        input: &Record,
        options: &CreateProjectOptions,
    ) -> SdkResult<Option<Value>> {
        let is_public = input.get("public").and_then(Record::as_bool).unwrap_or(false);

        let (key, public_key, private_key) = match options.key_type {
            WrappedKeyType::AesCbc => {
                let key = aes::generate();
                let private_key = is_public.then(|| STANDARD.encode(aes::export_key(&key)));
                (ResourceKey::from(key), None, private_key)
            }
            WrappedKeyType::Ec => {
                let key_pair = KeyPair::generate_ec()?;
                let public_key = key_pair.public_key().to_string();
                let private_key = if is_public {
                    Some(key_pair.export()?)
                } else {
                    None
                };
                (ResourceKey::from(key_pair), Some(public_key), private_key)
            }
        };
        let encrypted_key = creator.wrap_key(&key)?;

        let mut board = input.get("board").cloned().unwrap_or_else(Record::object);
        if let Some(public_key) = public_key {
            board.insert("publicKey", public_key);
        }
        board.insert("encryptedKey", encrypted_key);
        board.insert(CHECKPOINT_FIELD, options.migration_count);
        board.insert("keyType", options.key_type.as_str());
        if let Some(private_key) = private_key {
            board.insert("privateKey", private_key);
        }

        let mut project = input.clone();
        project.insert("board", board);
        let body = Value::from(encrypt_fields(&project, &key)?);

        let path = match &options.organisation_id {
            Some(org) => format!("/organisations/{org}/boards/"),
            None => "/boards/".to_string(),
        };
        debug!(key_type = options.key_type.as_str(), "creating project");
        transport.request(&path, Method::Post, Some(&body)).await
    }
}

#[async_trait]
impl MigrationStore for ProjectClient {
    async fn update_board(&self, fields: Record) -> SdkResult<()> {
        ProjectClient::update_board(self, &fields).await.map(|_| ())
    }

    async fn update_column(&self, column_id: &str, fields: Record) -> SdkResult<()> {
        ProjectClient::update_column(self, column_id, &fields)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portabella_crypto::KeyType;

    fn user() -> KeyPair {
        KeyPair::from_mnemonic(
            KeyType::Ec,
            "legal winner thank year wave sausage worth useful legal winner thank yellow",
        )
        .unwrap()
    }

    #[test]
    fn scope_paths() {
        assert_eq!(ProjectScope::new("p1").base_path(), "/boards/p1");
        assert_eq!(
            ProjectScope::new("p1").in_organisation("o1").base_path(),
            "/organisations/o1/boards/p1"
        );
    }

    #[test]
    fn encrypted_key_overrides_private_key() {
        let user = user();
        let wrapped_for_user = aes::generate();
        let public = aes::generate();
        let encrypted_key = user.wrap_key(&ResourceKey::from(wrapped_for_user.clone())).unwrap();
        let private_key = STANDARD.encode(aes::export_key(&public));

        let resolved = resolve_resource_key(
            Some(&user),
            Some(&encrypted_key),
            WrappedKeyType::AesCbc,
            Some(&private_key),
        )
        .unwrap();
        let ResourceKey::Symmetric(resolved) = resolved else {
            panic!("expected a symmetric key");
        };
        assert_eq!(resolved.as_bytes(), wrapped_for_user.as_bytes());
    }

    #[test]
    fn anonymous_access_uses_private_key() {
        let project_key = KeyPair::generate_ec().unwrap();
        let exported = project_key.export().unwrap();
        let resolved = resolve_resource_key(
            None,
            Some("ignored without a user key"),
            WrappedKeyType::Ec,
            Some(&exported),
        )
        .unwrap();
        assert_eq!(
            resolved.as_key_pair().unwrap().public_key(),
            project_key.public_key()
        );
    }

    #[test]
    fn no_key_material_is_missing_key() {
        assert!(matches!(
            resolve_resource_key(Some(&user()), None, WrappedKeyType::Ec, None),
            Err(SdkError::MissingKey(_))
        ));
    }

    #[test]
    fn unwrap_failure_is_fatal() {
        assert!(matches!(
            resolve_resource_key(Some(&user()), Some("garbage"), WrappedKeyType::Ec, None),
            Err(SdkError::Crypto(_))
        ));
    }

    #[test]
    fn key_type_defaults_to_ec() {
        let record = Record::from(serde_json::json!({ "encryptedKey": "x" }));
        assert_eq!(wrapped_key_type(&record).unwrap(), WrappedKeyType::Ec);
        let record = Record::from(serde_json::json!({ "keyType": "AES-CBC" }));
        assert_eq!(wrapped_key_type(&record).unwrap(), WrappedKeyType::AesCbc);
    }
}
