use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{require_non_empty, require_path_segment, AppError};
use crate::models::upload::FileUploadRecord;
use crate::storage::{get_json, keys, put_json, ObjectStore, StoreError};

/// A credential pair granting direct store access to one storage key. The
/// upload window is short; the download window is longer. Single-use in
/// intent only — nothing beyond the store-level signature expiry enforces it.
#[derive(Debug)]
pub struct IssuedCredential {
    pub upload_url: String,
    pub download_url: String,
    pub storage_key: String,
    pub entry_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct CredentialRequest<'a> {
    pub file_name: &'a str,
    pub file_type: &'a str,
    pub org_id: &'a str,
    pub employee_id: Option<u32>,
    pub question_id: &'a str,
}

/// Issues an upload/download credential pair. Validation happens before any
/// storage key is derived; every issuance gets a fresh entry id, even a
/// re-upload for the same question. Issuance failures are always surfaced —
/// re-invoking with the same parameters is safe and cheap, and the caller
/// owns the decision to fall back to local storage.
pub async fn issue_upload_credential(
    store: &dyn ObjectStore,
    config: &Config,
    req: CredentialRequest<'_>,
) -> Result<IssuedCredential, AppError> {
    require_non_empty("fileName", req.file_name)?;
    require_non_empty("fileType", req.file_type)?;
    require_path_segment("orgId", req.org_id)?;
    require_path_segment("questionId", req.question_id)?;

    let now = Utc::now();
    let storage_key = keys::upload_object_key(
        req.org_id,
        req.employee_id,
        req.question_id,
        now.timestamp_millis(),
        req.file_name,
    );

    let upload_url = store
        .presign_put(
            &storage_key,
            req.file_type,
            Duration::from_secs(config.upload_url_ttl_secs),
        )
        .await?;
    let download_url = store
        .presign_get(&storage_key, Duration::from_secs(config.download_url_ttl_secs))
        .await?;

    let entry_id = Uuid::new_v4();
    info!(%entry_id, %storage_key, "upload credential issued");

    Ok(IssuedCredential {
        upload_url,
        download_url,
        storage_key,
        entry_id,
        expires_at: now + chrono::Duration::seconds(config.upload_url_ttl_secs as i64),
    })
}

/// Appends a registry record for a completed upload. Keyed by entry id, so a
/// retry with the same id overwrites the same record (last-write-wins).
pub async fn register_upload(
    store: &dyn ObjectStore,
    record: &FileUploadRecord,
) -> Result<(), StoreError> {
    let key = keys::registry_entry_key(&record.org_id, &record.entry_id);
    put_json(store, &key, record).await?;
    info!(entry_id = %record.entry_id, file_name = %record.file_name, "upload registered");
    Ok(())
}

/// Registry records for an organization, optionally narrowed to one
/// employee. Unordered; callers sort by timestamp if needed.
pub async fn list_files(
    store: &dyn ObjectStore,
    org_id: &str,
    employee_id: Option<u32>,
) -> Result<Vec<FileUploadRecord>, StoreError> {
    let mut records = Vec::new();
    for key in store.list(&keys::registry_prefix(org_id)).await? {
        // Listed then deleted between calls: skip; callers re-list to retry.
        let Some(record) = get_json::<FileUploadRecord>(store, &key).await? else {
            continue;
        };
        if employee_id.is_none() || record.employee_id == employee_id {
            records.push(record);
        }
    }
    Ok(records)
}

#[derive(Debug)]
pub struct DeleteOutcome {
    /// The object is gone but the registry record survived; accepted
    /// inconsistency window, surfaced as a warning rather than a failure.
    pub orphaned_registry_entry: bool,
}

/// Deletes the object, then its registry record. The owning organization is
/// recovered from the storage key.
pub async fn delete_file(
    store: &dyn ObjectStore,
    entry_id: &Uuid,
    storage_key: &str,
) -> Result<DeleteOutcome, AppError> {
    let org_id = keys::org_id_from_upload_key(storage_key).ok_or_else(|| {
        AppError::Validation(format!(
            "storageKey is outside the uploads namespace: {storage_key}"
        ))
    })?;

    store.delete(storage_key).await.map_err(AppError::from)?;

    let registry_key = keys::registry_entry_key(org_id, entry_id);
    match store.delete(&registry_key).await {
        Ok(()) | Err(StoreError::NotFound(_)) => {
            info!(%entry_id, storage_key, "file and registry record deleted");
            Ok(DeleteOutcome {
                orphaned_registry_entry: false,
            })
        }
        Err(e) => {
            warn!(
                %entry_id,
                %registry_key,
                error = %e,
                "registry delete failed after object delete; orphaned registry entry"
            );
            Ok(DeleteOutcome {
                orphaned_registry_entry: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::upload::FormType;
    use crate::storage::memory::MemoryStore;

    fn test_config() -> Config {
        Config {
            s3_bucket: "test-bucket".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            port: 0,
            rust_log: "info".to_string(),
            question_catalog_path: None,
            fallback_cache_dir: "unused".to_string(),
            upload_url_ttl_secs: 300,
            download_url_ttl_secs: 3600,
            display_name_question: "employeeName".to_string(),
        }
    }

    fn record_for(store_key: &str, entry_id: Uuid, employee_id: Option<u32>) -> FileUploadRecord {
        FileUploadRecord {
            entry_id,
            org_id: "ACME1".to_string(),
            employee_id,
            question_id: "Q3".to_string(),
            file_name: "report.pdf".to_string(),
            file_size: 1024,
            file_type: "application/pdf".to_string(),
            storage_key: store_key.to_string(),
            download_url: None,
            form_type: match employee_id {
                Some(_) => FormType::Employee,
                None => FormType::Organization,
            },
            uploaded_at: Utc::now(),
            question_context: None,
        }
    }

    #[tokio::test]
    async fn test_issuance_validates_before_deriving_a_key() {
        let store = MemoryStore::new();
        let config = test_config();

        let err = issue_upload_credential(
            &store,
            &config,
            CredentialRequest {
                file_name: "",
                file_type: "application/pdf",
                org_id: "ACME1",
                employee_id: None,
                question_id: "Q1",
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = issue_upload_credential(
            &store,
            &config,
            CredentialRequest {
                file_name: "a.pdf",
                file_type: "application/pdf",
                org_id: "",
                employee_id: None,
                question_id: "Q1",
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_each_issuance_gets_a_fresh_entry_id() {
        let store = MemoryStore::new();
        let config = test_config();
        let req = || CredentialRequest {
            file_name: "a.pdf",
            file_type: "application/pdf",
            org_id: "ACME1",
            employee_id: Some(0),
            question_id: "Q1",
        };

        let first = issue_upload_credential(&store, &config, req()).await.unwrap();
        let second = issue_upload_credential(&store, &config, req()).await.unwrap();

        assert_ne!(first.entry_id, second.entry_id);
        assert!(first
            .storage_key
            .starts_with("organizations/ACME1/uploads/employees/0/Q1/"));
        assert!(first.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_register_is_idempotent_per_entry_id() {
        let store = MemoryStore::new();
        let entry_id = Uuid::new_v4();
        let record = record_for("organizations/ACME1/uploads/organization/Q3/1_a.pdf", entry_id, None);

        register_upload(&store, &record).await.unwrap();
        register_upload(&store, &record).await.unwrap();

        let records = list_files(&store, "ACME1", None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entry_id, entry_id);
    }

    #[tokio::test]
    async fn test_list_filters_by_employee() {
        let store = MemoryStore::new();
        let org_record = record_for(
            "organizations/ACME1/uploads/organization/Q1/1_a.pdf",
            Uuid::new_v4(),
            None,
        );
        let employee_record = record_for(
            "organizations/ACME1/uploads/employees/0/Q1/2_b.pdf",
            Uuid::new_v4(),
            Some(0),
        );
        register_upload(&store, &org_record).await.unwrap();
        register_upload(&store, &employee_record).await.unwrap();

        assert_eq!(list_files(&store, "ACME1", None).await.unwrap().len(), 2);

        let scoped = list_files(&store, "ACME1", Some(0)).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].entry_id, employee_record.entry_id);
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_registry_record() {
        let store = MemoryStore::new();
        let storage_key = "organizations/ACME1/uploads/organization/Q3/1_a.pdf";
        let entry_id = Uuid::new_v4();
        store
            .put(storage_key, bytes::Bytes::from_static(b"pdf"), "application/pdf")
            .await
            .unwrap();
        register_upload(&store, &record_for(storage_key, entry_id, None))
            .await
            .unwrap();

        let outcome = delete_file(&store, &entry_id, storage_key).await.unwrap();
        assert!(!outcome.orphaned_registry_entry);
        assert!(!store.contains(storage_key));
        assert!(list_files(&store, "ACME1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_delete_failure_is_an_orphan_warning_not_an_error() {
        let store = MemoryStore::new();
        let storage_key = "organizations/ACME1/uploads/organization/Q3/1_a.pdf";
        let entry_id = Uuid::new_v4();
        store
            .put(storage_key, bytes::Bytes::from_static(b"pdf"), "application/pdf")
            .await
            .unwrap();
        register_upload(&store, &record_for(storage_key, entry_id, None))
            .await
            .unwrap();
        store.poison_delete(&keys::registry_entry_key("ACME1", &entry_id));

        let outcome = delete_file(&store, &entry_id, storage_key).await.unwrap();
        assert!(outcome.orphaned_registry_entry);
        assert!(!store.contains(storage_key));
        // The orphaned record is still listed.
        assert_eq!(list_files(&store, "ACME1", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_rejects_keys_outside_the_uploads_namespace() {
        let store = MemoryStore::new();
        let err = delete_file(
            &store,
            &Uuid::new_v4(),
            "organizations/ACME1/company.json",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
