use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::{require_non_empty, require_path_segment, AppError};
use crate::models::upload::{FileUploadRecord, FormType};
use crate::state::AppState;
use crate::storage::{keys, StoreError};
use crate::uploads::broker::{self, CredentialRequest};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlRequest {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub employee_id: Option<u32>,
    #[serde(default)]
    pub question_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub download_url: String,
    pub storage_key: String,
    pub entry_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// POST /presigned-url
///
/// Issuance failures are always reported; the client falls back to local
/// storage on its side when issuance or the raw upload fails.
pub async fn issue_presigned_url(
    State(state): State<AppState>,
    Json(req): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    let credential = broker::issue_upload_credential(
        state.store.as_ref(),
        &state.config,
        CredentialRequest {
            file_name: &req.file_name,
            file_type: &req.file_type,
            org_id: &req.org_id,
            employee_id: req.employee_id,
            question_id: &req.question_id,
        },
    )
    .await?;

    Ok(Json(PresignedUrlResponse {
        upload_url: credential.upload_url,
        download_url: credential.download_url,
        storage_key: credential.storage_key,
        entry_id: credential.entry_id,
        expires_at: credential.expires_at,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFileRequest {
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub employee_id: Option<u32>,
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub storage_key: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub form_type: Option<FormType>,
    #[serde(default)]
    pub entry_id: Option<Uuid>,
    #[serde(default)]
    pub question_context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFileResponse {
    pub success: bool,
    pub entry_id: Uuid,
    #[serde(skip_serializing_if = "is_false")]
    pub degraded: bool,
}

/// POST /file-registry
pub async fn register_file(
    State(state): State<AppState>,
    Json(req): Json<RegisterFileRequest>,
) -> Result<Json<RegisterFileResponse>, AppError> {
    require_path_segment("orgId", &req.org_id)?;
    require_path_segment("questionId", &req.question_id)?;
    require_non_empty("fileName", &req.file_name)?;
    require_non_empty("storageKey", &req.storage_key)?;
    let entry_id = req
        .entry_id
        .ok_or_else(|| AppError::Validation("entryId is required".to_string()))?;

    let record = FileUploadRecord {
        entry_id,
        org_id: req.org_id,
        employee_id: req.employee_id,
        question_id: req.question_id,
        file_name: req.file_name,
        file_size: req.file_size,
        file_type: req.file_type,
        storage_key: req.storage_key,
        download_url: req.download_url,
        form_type: req.form_type.unwrap_or(match req.employee_id {
            Some(_) => FormType::Employee,
            None => FormType::Organization,
        }),
        uploaded_at: Utc::now(),
        question_context: req.question_context,
    };

    match broker::register_upload(state.store.as_ref(), &record).await {
        Ok(()) => Ok(Json(RegisterFileResponse {
            success: true,
            entry_id,
            degraded: false,
        })),
        Err(StoreError::Transport(reason)) => {
            warn!(%entry_id, %reason, "registry write failed; absorbing into fallback cache");
            let key = keys::registry_entry_key(&record.org_id, &record.entry_id);
            state.fallback.absorb_json(&key, &record).await?;
            Ok(Json(RegisterFileResponse {
                success: true,
                entry_id,
                degraded: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    pub org_id: String,
    #[serde(default)]
    pub employee_id: Option<u32>,
}

/// GET /file-registry?orgId=&employeeId=
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<FileUploadRecord>>, AppError> {
    require_path_segment("orgId", &query.org_id)?;
    match broker::list_files(state.store.as_ref(), &query.org_id, query.employee_id).await {
        Ok(records) => Ok(Json(records)),
        Err(StoreError::Transport(reason)) => {
            warn!(org_id = %query.org_id, %reason, "registry listing failed; consulting fallback cache");
            let records = state
                .fallback
                .registry_records(&query.org_id)
                .await?
                .into_iter()
                .filter(|r| query.employee_id.is_none() || r.employee_id == query.employee_id)
                .collect();
            Ok(Json(records))
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    #[serde(default)]
    pub storage_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResponse {
    pub success: bool,
    pub message: String,
}

/// DELETE /file/:entry_id
///
/// No fallback path: a local mirror cannot delete a remote object, so a
/// transport failure here surfaces as 503.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Json(req): Json<DeleteFileRequest>,
) -> Result<Json<DeleteFileResponse>, AppError> {
    require_non_empty("storageKey", &req.storage_key)?;
    let outcome = broker::delete_file(state.store.as_ref(), &entry_id, &req.storage_key).await?;
    let message = if outcome.orphaned_registry_entry {
        "file deleted; registry record could not be removed and remains orphaned".to_string()
    } else {
        "file and registry record deleted".to_string()
    };
    Ok(Json(DeleteFileResponse {
        success: true,
        message,
    }))
}
