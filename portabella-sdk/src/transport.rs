//! Request transport for the Portabella backend.
//!
//! Clients only need "send this JSON to this path and give me JSON back",
//! expressed by [`Transport`]. [`HttpTransport`] is the reqwest
//! implementation; tests substitute their own.

use crate::auth::RequestSigner;
use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP verb of a backend request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Authenticated JSON request function.
///
/// A no-content response is `Ok(None)`; any 4xx/5xx is
/// [`SdkError::Transport`] carrying the response text.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> SdkResult<Option<Value>>;
}

/// reqwest-backed [`Transport`].
pub struct HttpTransport {
    client: Client,
    config: SdkConfig,
    signer: Option<Arc<RequestSigner>>,
}

impl HttpTransport {
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            signer: None,
        })
    }

    /// Attaches signed-challenge headers to every request.
    pub fn with_signer(mut self, signer: Arc<RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn signer(&self) -> Option<&Arc<RequestSigner>> {
        self.signer.as_ref()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> SdkResult<Option<Value>> {
        let url = format!("{}{}", self.config.base_url(), path);
        debug!("{method} {path}");

        let mut builder = self
            .client
            .request(method.into(), &url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(signer) = &self.signer {
            for (name, value) in signer.headers().await? {
                builder = builder.header(name, value);
            }
        }

        let resp = builder.send().await?;
        let status = resp.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status.is_client_error() || status.is_server_error() {
            let text = resp.text().await?;
            debug!("{method} {path} failed with {status}");
            return Err(SdkError::Transport(text));
        }
        if !status.is_success() {
            return Ok(None);
        }

        let bytes = resp.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok((!value.is_null()).then_some(value))
    }
}
