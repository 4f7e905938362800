//! Degraded-mode local mirror. Activated only when a remote call fails with a
//! `Transport`-class error: the write lands on local disk under the same key
//! namespace as the remote store and stays journalled until an explicit
//! reconciliation pass replays it. Reads always prefer the remote store; the
//! cache is consulted only after a remote failure. There is no background
//! sync — implicit replay could clobber a fresher remote document with a
//! stale local one.

pub mod handlers;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::catalog::QuestionCatalog;
use crate::errors::AppError;
use crate::models::assessment::AssessmentDocument;
use crate::models::upload::FileUploadRecord;
use crate::storage::{keys, ObjectStore};

pub struct LocalCache {
    root: PathBuf,
    degraded: AtomicBool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub replayed: u32,
    pub failed: u32,
    pub remaining: u32,
}

impl LocalCache {
    /// Opens (or creates) the cache directory. Writes journalled by a
    /// previous run keep degraded mode on until they are reconciled.
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let pending = !walk_files(&root)?.is_empty();
        if pending {
            warn!(
                "fallback cache at {} has journalled writes from a previous run",
                root.display()
            );
        }
        Ok(Self {
            root,
            degraded: AtomicBool::new(pending),
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are derived from validated path segments; safe to join.
        self.root.join(key)
    }

    /// Journals a raw write under the remote key. Flips degraded mode on.
    pub async fn absorb(&self, key: &str, bytes: Bytes) -> Result<(), AppError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(key, e))?;
        }
        fs::write(&path, &bytes).await.map_err(|e| io_error(key, e))?;
        self.degraded.store(true, Ordering::SeqCst);
        warn!(key, "write absorbed by local fallback cache");
        Ok(())
    }

    pub async fn absorb_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| AppError::Internal(anyhow!("serialize fallback write for {key}: {e}")))?;
        self.absorb(key, Bytes::from(body)).await
    }

    pub async fn read(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    pub async fn read_document(&self, key: &str) -> Result<Option<AssessmentDocument>, AppError> {
        match self.read(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::Internal(anyhow!("corrupt fallback document at {key}: {e}"))),
            None => Ok(None),
        }
    }

    /// The degraded-mode counterpart of an assessment save: merge the delta
    /// into the locally mirrored document (or a fresh one) and journal it.
    pub async fn absorb_save(
        &self,
        catalog: &QuestionCatalog,
        key: &str,
        employee_id: Option<u32>,
        delta: &BTreeMap<String, Value>,
        explicit_submit: bool,
    ) -> Result<AssessmentDocument, AppError> {
        let mut doc = self
            .read_document(key)
            .await?
            .unwrap_or_else(|| AssessmentDocument::new(employee_id));
        if doc.employee_id.is_none() {
            doc.employee_id = employee_id;
        }
        doc.apply_delta(delta, catalog, explicit_submit);
        self.absorb_json(key, &doc).await?;
        Ok(doc)
    }

    /// Every journalled key, relative to the cache root, remote-schema shaped.
    pub async fn pending_keys(&self) -> Result<Vec<String>, AppError> {
        let files = walk_files(&self.root)
            .map_err(|e| AppError::Internal(anyhow!("walk fallback cache: {e}")))?;
        let mut pending = Vec::with_capacity(files.len());
        for path in files {
            let rel = path.strip_prefix(&self.root).unwrap_or(&path);
            pending.push(
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
        }
        pending.sort();
        Ok(pending)
    }

    /// Locally mirrored employee documents for an organization, used for
    /// degraded-mode listings and id allocation.
    pub async fn employee_documents(
        &self,
        org_id: &str,
    ) -> Result<Vec<(u32, AssessmentDocument)>, AppError> {
        let prefix = keys::employee_document_prefix(org_id);
        let mut docs = Vec::new();
        for key in self.pending_keys().await? {
            if !key.starts_with(&prefix) {
                continue;
            }
            let Some(employee_id) = keys::employee_id_from_document_key(&key) else {
                continue;
            };
            if let Some(doc) = self.read_document(&key).await? {
                docs.push((employee_id, doc));
            }
        }
        Ok(docs)
    }

    /// Locally mirrored registry records for an organization.
    pub async fn registry_records(&self, org_id: &str) -> Result<Vec<FileUploadRecord>, AppError> {
        let prefix = keys::registry_prefix(org_id);
        let mut records = Vec::new();
        for key in self.pending_keys().await? {
            if !key.starts_with(&prefix) {
                continue;
            }
            if let Some(bytes) = self.read(&key).await? {
                match serde_json::from_slice(&bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(%key, error = %e, "skipping corrupt fallback registry record"),
                }
            }
        }
        Ok(records)
    }

    /// Explicit reconciliation pass: replay every journalled write to the
    /// remote store, dropping local copies that land. Partial failure keeps
    /// the rest journalled; degraded mode clears only when nothing remains.
    pub async fn reconcile(&self, store: &dyn ObjectStore) -> Result<ReconcileReport, AppError> {
        let mut report = ReconcileReport::default();
        for key in self.pending_keys().await? {
            let Some(bytes) = self.read(&key).await? else {
                continue;
            };
            match store.put(&key, bytes, "application/json").await {
                Ok(()) => {
                    fs::remove_file(self.path_for(&key))
                        .await
                        .map_err(|e| io_error(&key, e))?;
                    report.replayed += 1;
                    info!(%key, "fallback write replayed to remote store");
                }
                Err(e) => {
                    warn!(%key, error = %e, "fallback replay failed; keeping local copy");
                    report.failed += 1;
                }
            }
        }
        report.remaining = self.pending_keys().await?.len() as u32;
        if report.remaining == 0 {
            self.degraded.store(false, Ordering::SeqCst);
            info!("fallback cache drained; leaving degraded mode");
        }
        Ok(report)
    }
}

fn io_error(key: &str, e: std::io::Error) -> AppError {
    AppError::Internal(anyhow!("fallback cache i/o for {key}: {e}"))
}

fn walk_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                stack.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QuestionDef;
    use crate::models::assessment::AssessmentState;
    use crate::storage::get_json;
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    fn one_question_catalog() -> QuestionCatalog {
        QuestionCatalog::new(vec![QuestionDef {
            id: "Q1".to_string(),
            required: true,
        }])
    }

    #[tokio::test]
    async fn test_absorb_flips_degraded_mode_and_journals_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path()).unwrap();
        assert!(!cache.is_degraded());

        let key = keys::company_document_key("ACME1");
        cache.absorb_json(&key, &json!({"x": 1})).await.unwrap();

        assert!(cache.is_degraded());
        assert_eq!(cache.pending_keys().await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_absorb_save_merges_with_the_local_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path()).unwrap();
        let catalog = one_question_catalog();
        let key = keys::employee_document_key("ACME1", 0);

        let delta: BTreeMap<String, Value> = [("Q1".to_string(), json!("first"))].into();
        cache
            .absorb_save(&catalog, &key, Some(0), &delta, false)
            .await
            .unwrap();

        let delta: BTreeMap<String, Value> = [("Q1".to_string(), json!("second"))].into();
        let doc = cache
            .absorb_save(&catalog, &key, Some(0), &delta, true)
            .await
            .unwrap();

        assert_eq!(doc.responses["Q1"], json!("second"));
        assert_eq!(doc.state, AssessmentState::Completed);
        assert_eq!(doc.employee_id, Some(0));
    }

    #[tokio::test]
    async fn test_reconcile_replays_to_a_recovered_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        let key = keys::company_document_key("ACME1");

        cache
            .absorb_save(&one_question_catalog(), &key, None, &BTreeMap::new(), false)
            .await
            .unwrap();
        assert!(cache.is_degraded());

        let report = cache.reconcile(&store).await.unwrap();
        assert_eq!(report.replayed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.remaining, 0);
        assert!(!cache.is_degraded());

        let replayed: Option<AssessmentDocument> = get_json(&store, &key).await.unwrap();
        assert!(replayed.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_against_a_still_offline_store_keeps_the_journal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path()).unwrap();
        let store = MemoryStore::new();
        store.set_offline(true);

        let key = keys::company_document_key("ACME1");
        cache.absorb_json(&key, &json!({"x": 1})).await.unwrap();

        let report = cache.reconcile(&store).await.unwrap();
        assert_eq!(report.replayed, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 1);
        assert!(cache.is_degraded());
    }

    #[tokio::test]
    async fn test_journal_from_a_previous_run_reopens_degraded() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = LocalCache::new(dir.path()).unwrap();
            cache
                .absorb_json(&keys::company_document_key("ACME1"), &json!({}))
                .await
                .unwrap();
        }
        let reopened = LocalCache::new(dir.path()).unwrap();
        assert!(reopened.is_degraded());
    }

    #[tokio::test]
    async fn test_employee_documents_lists_only_the_requested_org() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path()).unwrap();
        let catalog = one_question_catalog();

        cache
            .absorb_save(
                &catalog,
                &keys::employee_document_key("ACME1", 0),
                Some(0),
                &BTreeMap::new(),
                false,
            )
            .await
            .unwrap();
        cache
            .absorb_save(
                &catalog,
                &keys::employee_document_key("OTHER", 0),
                Some(0),
                &BTreeMap::new(),
                false,
            )
            .await
            .unwrap();

        let docs = cache.employee_documents("ACME1").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, 0);
    }
}
