//! Key namespace for the object store. Every persisted artifact lives under
//! `organizations/{orgId}/`:
//!
//! - `company.json` — the organization assessment document
//! - `employee_{id}.json` — one document per employee id
//! - `registry/{entryId}.json` — one file-upload registry record per entry
//! - `uploads/...` — the uploaded objects themselves
//!
//! Organization and question ids are externally supplied; they are validated
//! as path segments before any key is derived.

use uuid::Uuid;

pub fn company_document_key(org_id: &str) -> String {
    format!("organizations/{org_id}/company.json")
}

pub fn employee_document_key(org_id: &str, employee_id: u32) -> String {
    format!("organizations/{org_id}/employee_{employee_id}.json")
}

pub fn employee_document_prefix(org_id: &str) -> String {
    format!("organizations/{org_id}/employee_")
}

pub fn registry_entry_key(org_id: &str, entry_id: &Uuid) -> String {
    format!("organizations/{org_id}/registry/{entry_id}.json")
}

pub fn registry_prefix(org_id: &str) -> String {
    format!("organizations/{org_id}/registry/")
}

/// Object key for an uploaded file:
/// `organizations/{orgId}/uploads/{organization|employees/{id}}/{questionId}/{timestamp}_{sanitizedFileName}`.
pub fn upload_object_key(
    org_id: &str,
    employee_id: Option<u32>,
    question_id: &str,
    timestamp_millis: i64,
    file_name: &str,
) -> String {
    let scope = match employee_id {
        Some(id) => format!("employees/{id}"),
        None => "organization".to_string(),
    };
    format!(
        "organizations/{org_id}/uploads/{scope}/{question_id}/{timestamp_millis}_{}",
        sanitize_file_name(file_name)
    )
}

/// Replaces any character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// True when `segment` can be embedded in a storage key without changing the
/// key's shape. Externally supplied ids (organization, question) must pass.
pub fn is_valid_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\\')
}

/// Parses the employee id out of an `employee_{id}.json` document key.
/// Returns `None` for keys that are not employee documents.
pub fn employee_id_from_document_key(key: &str) -> Option<u32> {
    let file = key.rsplit('/').next()?;
    file.strip_prefix("employee_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Recovers the owning organization id from an upload object key.
pub fn org_id_from_upload_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("organizations/")?;
    let (org_id, rest) = rest.split_once('/')?;
    rest.starts_with("uploads/").then_some(org_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_disallowed_characters() {
        assert_eq!(sanitize_file_name("report final (2).pdf"), "report_final__2_.pdf");
        assert_eq!(sanitize_file_name("já hello.png"), "j__hello.png");
        assert_eq!(sanitize_file_name("clean-name_1.txt"), "clean-name_1.txt");
    }

    #[test]
    fn test_upload_key_organization_scope() {
        let key = upload_object_key("ACME1", None, "Q7", 1700000000000, "a b.pdf");
        assert_eq!(
            key,
            "organizations/ACME1/uploads/organization/Q7/1700000000000_a_b.pdf"
        );
    }

    #[test]
    fn test_upload_key_employee_scope() {
        let key = upload_object_key("ACME1", Some(0), "Q7", 1700000000000, "a.pdf");
        assert_eq!(
            key,
            "organizations/ACME1/uploads/employees/0/Q7/1700000000000_a.pdf"
        );
    }

    #[test]
    fn test_employee_id_from_document_key() {
        assert_eq!(
            employee_id_from_document_key("organizations/ACME1/employee_0.json"),
            Some(0)
        );
        assert_eq!(
            employee_id_from_document_key("organizations/ACME1/employee_17.json"),
            Some(17)
        );
        assert_eq!(
            employee_id_from_document_key("organizations/ACME1/company.json"),
            None
        );
        assert_eq!(
            employee_id_from_document_key("organizations/ACME1/employee_x.json"),
            None
        );
    }

    #[test]
    fn test_org_id_from_upload_key() {
        assert_eq!(
            org_id_from_upload_key("organizations/ACME1/uploads/organization/Q1/1_a.pdf"),
            Some("ACME1")
        );
        assert_eq!(
            org_id_from_upload_key("organizations/ACME1/registry/abc.json"),
            None
        );
        assert_eq!(org_id_from_upload_key("something/else"), None);
    }

    #[test]
    fn test_path_segment_validation() {
        assert!(is_valid_path_segment("ACME1"));
        assert!(is_valid_path_segment("acme-1_x.y"));
        assert!(!is_valid_path_segment(""));
        assert!(!is_valid_path_segment("."));
        assert!(!is_valid_path_segment(".."));
        assert!(!is_valid_path_segment("a/b"));
        assert!(!is_valid_path_segment("a\\b"));
    }

    #[test]
    fn test_case_sensitive_org_ids_produce_distinct_keys() {
        assert_ne!(company_document_key("Acme"), company_document_key("acme"));
    }
}
