//! Client SDK for Portabella.
//!
//! Talks to a backend that only ever sees ciphertext:
//! - Signed-challenge authentication from the user's key pair
//! - Project and team clients that resolve the resource key and encrypt
//!   request bodies / decrypt responses field by field
//! - Key distribution to members waiting for access
//! - Per-project data migrations with a persisted checkpoint
//! - Login key recovery across historical seed schemes

pub mod auth;
pub mod config;
pub mod error;
pub mod login;
pub mod migrations;
pub mod project;
pub mod team;
pub mod transport;
pub mod user;

pub use auth::{RequestSigner, SignedChallenge};
pub use config::SdkConfig;
pub use error::{SdkError, SdkResult};
pub use login::{derive_key_pair, recover_key_pair};
pub use migrations::{Migration, MigrationContext, MigrationStore, default_migrations, run_migrations};
pub use project::{CreateProjectOptions, ProjectClient, ProjectScope, resolve_resource_key};
pub use team::TeamClient;
pub use transport::{HttpTransport, Method, Transport};
pub use user::{Distribution, PendingMembership, RegisterParams, UserClient};
