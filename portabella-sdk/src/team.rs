//! Encrypted access to a team (organisation).

use crate::error::{SdkError, SdkResult};
use crate::project::{encrypted_request, resolve_listed_key, wrapped_key_type};
use crate::transport::Method;
use crate::user::UserClient;
use portabella_crypto::{Record, ResourceKey, decrypt_fields};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Client for one team, acting as `user`.
pub struct TeamClient {
    user: Arc<UserClient>,
    organisation_id: String,
    key: RwLock<Option<Arc<ResourceKey>>>,
}

impl TeamClient {
    pub fn new(user: Arc<UserClient>, organisation_id: impl Into<String>) -> Self {
        Self {
            user,
            organisation_id: organisation_id.into(),
            key: RwLock::new(None),
        }
    }

    pub fn organisation_id(&self) -> &str {
        &self.organisation_id
    }

    fn base_path(&self) -> String {
        format!("/organisations/{}", self.organisation_id)
    }

    /// Loads the team and unwraps its key from the caller's `employee` record.
    pub async fn load(&self) -> SdkResult<Record> {
        let mut organisation = self
            .user
            .get(&self.base_path())
            .await?
            .map(Record::from)
            .ok_or_else(|| SdkError::InvalidResponse("empty organisation response".to_string()))?;

        let employee = organisation
            .remove("employee")
            .ok_or_else(|| SdkError::MissingKey("not an employee of this team".to_string()))?;
        let encrypted_key = employee
            .get("encryptedKey")
            .and_then(Record::as_str)
            .ok_or_else(|| SdkError::MissingKey("team key not shared yet".to_string()))?;
        let user_key = self
            .user
            .key_pair()
            .ok_or_else(|| SdkError::MissingKey("no user key pair".to_string()))?;

        let key = user_key.unwrap_key(encrypted_key, wrapped_key_type(&organisation)?)?;
        let key = Arc::new(key);
        *self.key.write().await = Some(Arc::clone(&key));

        Ok(decrypt_fields(&organisation, &key))
    }

    async fn encrypted(
        &self,
        path: &str,
        method: Method,
        body: Option<&Record>,
    ) -> SdkResult<Option<Record>> {
        let key = self
            .key
            .read()
            .await
            .clone()
            .ok_or_else(|| SdkError::MissingKey("must load() the team before use".to_string()))?;
        let full_path = format!("{}{path}", self.base_path());
        encrypted_request(self.user.transport().as_ref(), &full_path, method, body, &key).await
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

    /// Lists the team's projects. Projects without key material are returned
    /// as listed.
    pub async fn get_projects(&self) -> SdkResult<Vec<Record>> {
        let listed = match self.user.get(&format!("{}/boards", self.base_path())).await? {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(SdkError::InvalidResponse(format!(
                    "expected a list of projects, got {other}"
                )));
            }
            None => return Ok(Vec::new()),
        };

        let user_key = self.user.key_pair().map(Arc::as_ref);
        listed
            .into_iter()
            .map(Record::from)
            .map(|project| {
                let has_key = ["encryptedKey", "privateKey"]
                    .iter()
                    .any(|field| project.get(field).is_some_and(|v| !v.is_null()));
                if !has_key {
                    return Ok(project);
                }
                let key = resolve_listed_key(user_key, &project)?;
                Ok(decrypt_fields(&project, &key))
            })
            .collect()
    }

    pub async fn add_member(&self, email: &str, role: &str) -> SdkResult<Option<Value>> {
        self.user
            .post(
                &format!("{}/members", self.base_path()),
                &json!({ "email": email, "role": role }),
            )
            .await
    }

    pub async fn get_members(&self) -> SdkResult<Option<Record>> {
        self.get("/members").await
    }

    pub async fn remove_member(&self, user_id: &str) -> SdkResult<Option<Value>> {
        self.user
            .del(&format!("{}/members/{user_id}", self.base_path()))
            .await
    }
}
