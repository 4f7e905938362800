use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an upload belongs to the organization form or an employee form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Organization,
    Employee,
}

/// One registry record per successfully uploaded object. The registry is
/// additive: each upload gets a fresh entry id, even a re-upload for the same
/// question, and records disappear only through an explicit delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadRecord {
    pub entry_id: Uuid,
    pub org_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<u32>,
    pub question_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub storage_key: String,
    /// Presigned read URL captured at registration time; expires with the
    /// credential, so listings re-derive fresh URLs when needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub form_type: FormType,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_context: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_with_camel_case_fields() {
        let record = FileUploadRecord {
            entry_id: Uuid::new_v4(),
            org_id: "ACME1".to_string(),
            employee_id: Some(0),
            question_id: "Q3".to_string(),
            file_name: "report.pdf".to_string(),
            file_size: 2048,
            file_type: "application/pdf".to_string(),
            storage_key: "organizations/ACME1/uploads/employees/0/Q3/1_report.pdf".to_string(),
            download_url: None,
            form_type: FormType::Employee,
            uploaded_at: Utc::now(),
            question_context: None,
        };

        let encoded = serde_json::to_string(&record).unwrap();
        assert!(encoded.contains("\"entryId\""));
        assert!(encoded.contains("\"formType\":\"employee\""));
        assert!(encoded.contains("\"employeeId\":0"));

        let decoded: FileUploadRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.entry_id, record.entry_id);
        assert_eq!(decoded.form_type, FormType::Employee);
    }
}
