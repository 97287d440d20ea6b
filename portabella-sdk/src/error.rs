//! SDK error types.

use portabella_crypto::CryptoError;
use thiserror::Error;

/// Result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;

/// Errors that can occur talking to the backend or resolving keys.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Non-success response; carries the response body verbatim.
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A migration step failed; the checkpoint was left at `index`.
    #[error("migration {index} failed: {source}")]
    Migration {
        index: usize,
        #[source]
        source: Box<SdkError>,
    },

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for SdkError {
    fn from(err: tokio::task::JoinError) -> Self {
        SdkError::Task(err.to_string())
    }
}
