//! SDK configuration.

use crate::error::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};

/// Production backend.
pub const DEFAULT_BACKEND_URL: &str = "https://backend.portabella.io";

/// Backend started by the local development stack.
pub const LOCAL_BACKEND_URL: &str = "http://localhost:5000";

/// Configuration threaded into the transport at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Base URL every request path is appended to, without a trailing slash.
    pub backend_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long a signed challenge is reused before a new one is signed.
    pub signature_ttl_secs: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: 30,
            signature_ttl_secs: 240, // 4 minutes
        }
    }
}

impl SdkConfig {
    /// Config for a backend running on localhost.
    pub fn local() -> Self {
        Self {
            backend_url: LOCAL_BACKEND_URL.to_string(),
            ..Self::default()
        }
    }

    /// Default config pointed at `backend_url`.
    pub fn with_backend_url(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            ..Self::default()
        }
    }

    /// Rejects configs the transport cannot use.
    pub fn validate(&self) -> SdkResult<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(SdkError::Config(format!(
                "backend_url must be an http(s) URL, got {:?}",
                self.backend_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(SdkError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `backend_url` without any trailing slash.
    pub fn base_url(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }
}
