//! In-memory [`ObjectStore`] used by unit tests. `set_offline(true)` makes
//! every call fail with a `Transport` error to exercise the fallback path;
//! `poison_delete` makes deleting one specific key fail, for the
//! orphaned-registry-entry scenario.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (Bytes, String)>>,
    poisoned_deletes: Mutex<BTreeSet<String>>,
    offline: AtomicBool,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reads keep working, writes fail with a `Transport` error. Simulates
    /// an outage that begins mid-operation.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn poison_delete(&self, key: &str) {
        self.poisoned_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Transport("store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.check_online()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("store rejected write".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.check_online()?;
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_online()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_online()?;
        if self.poisoned_deletes.lock().unwrap().contains(key) {
            return Err(StoreError::Transport(format!("delete poisoned: {key}")));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> Result<String, StoreError> {
        self.check_online()?;
        Ok(format!("memory://upload/{key}"))
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> Result<String, StoreError> {
        self.check_online()?;
        Ok(format!("memory://download/{key}"))
    }
}
