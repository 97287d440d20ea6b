//! Account-level operations: registration, key distribution and listings.

use crate::auth::SignedChallenge;
use crate::error::{SdkError, SdkResult};
use crate::project::{resolve_listed_key, wrapped_key_type};
use crate::transport::{Method, Transport};
use futures::future::join_all;
use portabella_crypto::{KeyPair, KeyType, Record, ResourceKey, WrappedKeyType, decrypt_fields, encrypt_fields};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name reported for resources whose key has not been shared with us yet.
pub const MEMBERSHIP_PENDING: &str = "Membership pending";

/// Fields sent on registration besides the key material.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterParams {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribed_to_newsletter: Option<bool>,
}

/// A member waiting for a resource key, as listed by
/// `/boards/pending_memberships`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMembership {
    pub user_id: String,
    #[serde(default)]
    pub board_id: Option<String>,
    #[serde(default)]
    pub organisation_id: Option<String>,
    /// The recipient's public key.
    pub public_key: String,
    pub user_key_type: KeyType,
    /// The resource key wrapped for us.
    pub encrypted_key: String,
    #[serde(default)]
    pub board_key_type: Option<WrappedKeyType>,
    /// Set when the recipient is joining a team rather than a project.
    #[serde(default)]
    pub organisation_key_type: Option<WrappedKeyType>,
}

impl PendingMembership {
    /// Where the re-wrapped key is stored.
    pub fn member_path(&self) -> SdkResult<String> {
        let user_id = &self.user_id;
        match (&self.organisation_key_type, &self.organisation_id, &self.board_id) {
            (Some(_), Some(org), _) => Ok(format!("/organisations/{org}/members/{user_id}")),
            (None, Some(org), Some(board)) => {
                Ok(format!("/organisations/{org}/boards/{board}/members/{user_id}"))
            }
            (None, None, Some(board)) => Ok(format!("/boards/{board}/members/{user_id}")),
            _ => Err(SdkError::InvalidResponse(format!(
                "pending membership for {user_id} names no board or organisation"
            ))),
        }
    }

    fn wrapped_key_type(&self) -> WrappedKeyType {
        self.organisation_key_type
            .or(self.board_key_type)
            .unwrap_or(WrappedKeyType::Ec)
    }
}

/// Result of sharing a key with one pending member.
#[derive(Debug)]
pub struct Distribution {
    pub user_id: String,
    pub board_id: Option<String>,
    pub organisation_id: Option<String>,
    pub result: SdkResult<()>,
}

/// Client for the signed-in user.
pub struct UserClient {
    transport: Arc<dyn Transport>,
    key_pair: Option<Arc<KeyPair>>,
}

impl UserClient {
    pub fn new(transport: Arc<dyn Transport>, key_pair: Option<Arc<KeyPair>>) -> Self {
        Self {
            transport,
            key_pair,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn key_pair(&self) -> Option<&Arc<KeyPair>> {
        self.key_pair.as_ref()
    }

    fn require_key_pair(&self) -> SdkResult<&KeyPair> {
        self.key_pair
            .as_deref()
            .ok_or_else(|| SdkError::MissingKey("no user key pair".to_string()))
    }

    /// Registers `key_pair`'s public key, proving possession with a fresh
    /// signed challenge.
    pub async fn register(
        transport: &dyn Transport,
        key_pair: &KeyPair,
        params: &RegisterParams,
    ) -> SdkResult<Option<Value>> {
        let signed = SignedChallenge::generate(key_pair)?;
        let mut body = serde_json::to_value(params)?;
        if let Value::Object(map) = &mut body {
            map.insert("publicKey".into(), json!(key_pair.public_key()));
            map.insert("keyType".into(), json!(KeyType::Ec));
            map.insert("signature".into(), json!(signed.signature));
            map.insert("challenge".into(), json!(signed.challenge));
        }
        info!(email = %params.email, "registering user");
        transport.request("/users/register", Method::Post, Some(&body)).await
    }

    pub async fn get(&self, path: &str) -> SdkResult<Option<Value>> {
        self.transport.request(path, Method::Get, None).await
    }

    pub async fn put(&self, path: &str, data: &Value) -> SdkResult<Option<Value>> {
        self.transport.request(path, Method::Put, Some(data)).await
    }

    pub async fn post(&self, path: &str, data: &Value) -> SdkResult<Option<Value>> {
        self.transport.request(path, Method::Post, Some(data)).await
    }

    pub async fn del(&self, path: &str) -> SdkResult<Option<Value>> {
        self.transport.request(path, Method::Delete, None).await
    }

    /// Re-wraps every resource key a pending member is waiting for.
    ///
    /// Members are handled concurrently and independently; one failure does
    /// not stop the others, and a malformed entry only fails its own
    /// recipient. Listing the pending members is the only fatal step.
    pub async fn distribute_keys(&self) -> SdkResult<Vec<Distribution>> {
        let key_pair = self.require_key_pair()?;
        let pending: Vec<Value> = match self.get("/boards/pending_memberships").await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        debug!(count = pending.len(), "distributing keys");

        let outcomes = join_all(pending.into_iter().map(|entry| async move {
            let membership = match serde_json::from_value::<PendingMembership>(entry.clone()) {
                Ok(membership) => membership,
                Err(e) => {
                    let field = |name: &str| entry[name].as_str().map(str::to_string);
                    let user_id = field("userId").unwrap_or_default();
                    warn!(user_id = %user_id, error = %e, "malformed pending membership");
                    return Distribution {
                        user_id,
                        board_id: field("boardId"),
                        organisation_id: field("organisationId"),
                        result: Err(SdkError::Serialization(e)),
                    };
                }
            };
            let result = self.share_key(key_pair, &membership).await;
            if let Err(e) = &result {
                warn!(user_id = %membership.user_id, error = %e, "key distribution failed");
            }
            Distribution {
                user_id: membership.user_id,
                board_id: membership.board_id,
                organisation_id: membership.organisation_id,
                result,
            }
        }))
        .await;

        Ok(outcomes)
    }

    async fn share_key(&self, key_pair: &KeyPair, membership: &PendingMembership) -> SdkResult<()> {
        let path = membership.member_path()?;
        let key = key_pair.unwrap_key(&membership.encrypted_key, membership.wrapped_key_type())?;
        let wrapped =
            KeyPair::wrap_with_public_key(membership.user_key_type, &membership.public_key, &key)?;
        self.put(&path, &json!({ "encryptedKey": wrapped })).await?;
        Ok(())
    }

    /// Lists the user's projects, decrypted where the key is available.
    pub async fn get_projects(&self) -> SdkResult<Vec<Record>> {
        let listed = self.list("/me/boards").await?;
        let mut projects = Vec::with_capacity(listed.len());
        for project in listed {
            let has_key = project.get("encryptedKey").is_some_and(|v| !v.is_null())
                || project.get("publicKey").is_some_and(|v| !v.is_null());
            if !has_key {
                let mut pending = project;
                pending.insert("name", MEMBERSHIP_PENDING);
                projects.push(pending);
                continue;
            }
            let key = resolve_listed_key(self.key_pair.as_deref(), &project)?;
            projects.push(decrypt_fields(&project, &key));
        }
        Ok(projects)
    }

    /// Lists the user's teams, decrypted where the key is available.
    pub async fn get_teams(&self) -> SdkResult<Vec<Record>> {
        let listed = self.list("/me/organisations").await?;
        let mut teams = Vec::with_capacity(listed.len());
        for team in listed {
            let Some(encrypted_key) = team.get("encryptedKey").and_then(Record::as_str) else {
                let mut pending = Record::object();
                pending.insert("name", MEMBERSHIP_PENDING);
                teams.push(pending);
                continue;
            };
            let key = self
                .require_key_pair()?
                .unwrap_key(encrypted_key, wrapped_key_type(&team)?)?;
            teams.push(decrypt_fields(&team, &key));
        }
        Ok(teams)
    }

    /// Creates a team with a fresh EC key wrapped for this user.
    pub async fn create_team(&self, team: &Record) -> SdkResult<Option<Value>> {
        let key_pair = self.require_key_pair()?;
        let team_key = ResourceKey::from(KeyPair::generate_ec()?);

        let mut body = team.clone();
        body.insert("encryptedKey", key_pair.wrap_key(&team_key)?);
        body.insert("publicKey", key_pair.public_key());
        body.insert("keyType", WrappedKeyType::Ec.as_str());

        let body = Value::from(encrypt_fields(&body, &team_key)?);
        self.post("/organisations", &body).await
    }

    pub async fn add_member(&self, project_id: &str, email: &str, role: &str) -> SdkResult<Option<Value>> {
        self.post(
            &format!("/boards/{project_id}/members"),
            &json!({ "email": email, "role": role }),
        )
        .await
    }

    pub async fn remove_member(&self, project_id: &str, user_id: &str) -> SdkResult<Option<Value>> {
        self.del(&format!("/boards/{project_id}/members/{user_id}")).await
    }

    async fn list(&self, path: &str) -> SdkResult<Vec<Record>> {
        match self.get(path).await? {
            Some(Value::Array(items)) => Ok(items.into_iter().map(Record::from).collect()),
            Some(other) => Err(SdkError::InvalidResponse(format!(
                "expected a list from {path}, got {other}"
            ))),
            None => Ok(Vec::new()),
        }
    }
}
