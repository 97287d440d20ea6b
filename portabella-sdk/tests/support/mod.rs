//! Shared test helpers: an in-memory transport and fixed key material.

#![allow(dead_code)]

use async_trait::async_trait;
use portabella_crypto::{KeyPair, KeyType};
use portabella_sdk::{Method, SdkError, SdkResult, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const USER_MNEMONIC: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

pub const MEMBER_MNEMONIC: &str =
    "letter advice cage absurd amount doctor acoustic avoid letter advice cage above";

/// Routes SDK logs to the test harness; `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("portabella_sdk=debug,portabella_crypto=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn user_key_pair() -> KeyPair {
    KeyPair::from_mnemonic(KeyType::Ec, USER_MNEMONIC).unwrap()
}

pub fn member_key_pair() -> KeyPair {
    KeyPair::from_mnemonic(KeyType::Ec, MEMBER_MNEMONIC).unwrap()
}

/// A request seen by [`FakeTransport`].
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

enum Reply {
    Json(Option<Value>),
    Fail(String),
}

/// Canned responses keyed by method and path. Unrouted requests get `None`.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, value: Value) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Reply::Json(Some(value)));
    }

    pub fn fail(&self, method: Method, path: &str, text: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Reply::Fail(text.to_string()));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> SdkResult<Option<Value>> {
        self.requests.lock().unwrap().push(Recorded {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        match self.routes.lock().unwrap().get(&(method, path.to_string())) {
            Some(Reply::Json(value)) => Ok(value.clone()),
            Some(Reply::Fail(text)) => Err(SdkError::Transport(text.clone())),
            None => Ok(None),
        }
    }
}
