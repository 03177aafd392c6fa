//! Document store adapters used to mirror matchmaking state
//!
//! The live state machine never reads its queue, matches or results back
//! from the store. Player profiles are the one exception: a returning player
//! is hydrated from the `players` collection when the server has no
//! in-memory profile for them.
//!
//! Two adapters are provided and selected when the server is composed:
//! - [`MemoryStore`] keeps documents in process memory
//! - [`HttpDocumentStore`] talks to a REST document service

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

pub const PLAYERS: &str = "players";
pub const MATCHES: &str = "matches";

/// A JSON object keyed by field name.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("document store returned {status} for {collection}/{key}")]
    Status {
        status: u16,
        collection: String,
        key: String,
    },

    #[error("malformed document {collection}/{key}: {reason}")]
    Malformed {
        collection: String,
        key: String,
        reason: String,
    },

    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value document storage with optional field merge on write.
///
/// No transactions and no locking: each document is last-writer-wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Writes `document`. With `merge` set, only the given fields are
    /// replaced and every other field of an existing document is kept.
    async fn set(
        &self,
        collection: &str,
        key: &str,
        document: Document,
        merge: bool,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(key))
            .cloned())
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        document: Document,
        merge: bool,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        match documents.get_mut(key) {
            Some(existing) if merge => existing.extend(document),
            _ => {
                documents.insert(key.to_string(), document);
            }
        }

        Ok(())
    }
}

/// Client for a REST document service.
///
/// `GET {base}/{collection}/{key}` returns the document or 404, and
/// `PUT {base}/{collection}/{key}?merge=<bool>` writes it.
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentStore {
    /// Every request is abandoned after `timeout`, so a stalled service
    /// surfaces as a transport error instead of hanging its caller.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, collection: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, key)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let response = self.client.get(self.url(collection, key)).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("No document found at {}/{}", collection, key);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        match response.json::<Value>().await? {
            Value::Object(document) => Ok(Some(document)),
            other => Err(StoreError::Malformed {
                collection: collection.to_string(),
                key: key.to_string(),
                reason: format!("expected an object, got {}", other),
            }),
        }
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        document: Document,
        merge: bool,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.url(collection, key))
            .query(&[("merge", merge)])
            .json(&document)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        debug!("Data sent to {}/{}", collection, key);
        Ok(())
    }
}
