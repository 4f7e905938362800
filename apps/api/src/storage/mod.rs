//! Object store client: a thin keyed-blob abstraction used by every other
//! component. The store provides whole-object atomicity per key; there is no
//! partial-overwrite visibility, so whole-document overwrite is the only
//! consistency mechanism layered on top of it.

pub mod keys;
#[cfg(test)]
pub mod memory;
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Storage-layer failure taxonomy. `Transport` is the variant that activates
/// the fallback cache; everything else is surfaced to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("storage failure: {0}")]
    Other(String),
}

/// Keyed blob store contract. All operations are single-shot request/response;
/// `list` returns a finite snapshot and callers re-list to retry.
///
/// Carried in `AppState` as `Arc<dyn ObjectStore>`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Time-limited write credential for direct client-side upload to `key`.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError>;

    /// Time-limited read credential for `key`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError>;
}

/// Fetches and deserializes a JSON document, mapping a missing key to `None`.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Other(format!("corrupt document at {key}: {e}")))?;
            Ok(Some(value))
        }
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Serializes `value` and overwrites `key` wholesale.
pub async fn put_json<T: Serialize>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let body = serde_json::to_vec(value)
        .map_err(|e| StoreError::Other(format!("serialize document for {key}: {e}")))?;
    store.put(key, Bytes::from(body), "application/json").await
}
