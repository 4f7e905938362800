use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::catalog::QuestionCatalog;
use crate::models::assessment::{AssessmentDocument, AssessmentState, AssessmentStatus};
use crate::storage::{get_json, keys, put_json, ObjectStore, StoreError};

/// Failure modes of a save. A transport failure carries the merged document
/// when the remote read had already succeeded, so the fallback cache can
/// absorb the exact write that was lost instead of re-merging from stale
/// local data.
#[derive(Debug)]
pub enum SaveError {
    Transport {
        reason: String,
        merged: Option<AssessmentDocument>,
    },
    Store(StoreError),
}

/// Loads a document, mapping a missing key to `None`.
pub async fn load_document(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<Option<AssessmentDocument>, StoreError> {
    get_json(store, key).await
}

/// Read-merge-overwrite at whole-document granularity. Last write wins;
/// two concurrent saves for the same identity can silently drop one party's
/// delta (single-editor-per-identity usage; optimistic versioning is the
/// documented upgrade path, not an assumed behavior).
pub async fn save(
    store: &dyn ObjectStore,
    catalog: &QuestionCatalog,
    key: &str,
    employee_id: Option<u32>,
    delta: &BTreeMap<String, Value>,
    explicit_submit: bool,
) -> Result<AssessmentDocument, SaveError> {
    let existing = load_document(store, key).await.map_err(|e| match e {
        StoreError::Transport(reason) => SaveError::Transport {
            reason,
            merged: None,
        },
        other => SaveError::Store(other),
    })?;

    let mut doc = existing.unwrap_or_else(|| AssessmentDocument::new(employee_id));
    if doc.employee_id.is_none() {
        doc.employee_id = employee_id;
    }
    doc.apply_delta(delta, catalog, explicit_submit);

    match put_json(store, key, &doc).await {
        Ok(()) => {
            info!(
                key,
                state = ?doc.state,
                completion = doc.completion_percentage,
                "assessment document saved"
            );
            Ok(doc)
        }
        Err(StoreError::Transport(reason)) => Err(SaveError::Transport {
            reason,
            merged: Some(doc),
        }),
        Err(e) => Err(SaveError::Store(e)),
    }
}

/// `not-started` iff no document has ever been saved; otherwise the stored
/// state flag decides between `completed` and `in_progress`.
pub async fn get_status(
    store: &dyn ObjectStore,
    org_id: &str,
) -> Result<(AssessmentStatus, Option<AssessmentDocument>), StoreError> {
    match load_document(store, &keys::company_document_key(org_id)).await? {
        None => Ok((AssessmentStatus::NotStarted, None)),
        Some(doc) => Ok((doc.status(), Some(doc))),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub employee_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub completed: bool,
    pub last_saved: DateTime<Utc>,
}

/// Builds the per-employee listing row from a stored document.
pub fn summarize(
    employee_id: u32,
    doc: &AssessmentDocument,
    display_name_question: &str,
) -> EmployeeSummary {
    EmployeeSummary {
        employee_id,
        display_name: doc
            .responses
            .get(display_name_question)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        completed: doc.state == AssessmentState::Completed,
        last_saved: doc.last_modified,
    }
}

pub async fn employee_list(
    store: &dyn ObjectStore,
    org_id: &str,
    display_name_question: &str,
) -> Result<Vec<EmployeeSummary>, StoreError> {
    let mut employees = Vec::new();
    for key in store.list(&keys::employee_document_prefix(org_id)).await? {
        let Some(employee_id) = keys::employee_id_from_document_key(&key) else {
            continue;
        };
        // Listed then deleted between calls: skip rather than fail the listing.
        let Some(doc) = load_document(store, &key).await? else {
            continue;
        };
        employees.push(summarize(employee_id, &doc, display_name_question));
    }
    employees.sort_by_key(|e| e.employee_id);
    Ok(employees)
}
