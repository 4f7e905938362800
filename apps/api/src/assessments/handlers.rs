use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::assessments::store::{self, EmployeeSummary, SaveError};
use crate::errors::{require_path_segment, AppError};
use crate::models::assessment::{AssessmentDocument, AssessmentState, AssessmentStatus};
use crate::sessions::{self, SessionState};
use crate::state::AppState;
use crate::storage::{keys, StoreError};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCompanyRequest {
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
    #[serde(default)]
    pub is_explicit_submit: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEmployeeRequest {
    #[serde(default)]
    pub org_id: String,
    /// Omitted on the first save of a new-employee session; the server
    /// allocates the id and returns it.
    #[serde(default)]
    pub employee_id: Option<u32>,
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
    #[serde(default)]
    pub is_explicit_submit: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub state: AssessmentState,
    pub completion_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<u32>,
    #[serde(skip_serializing_if = "is_false")]
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStatusResponse {
    pub status: AssessmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_data: Option<AssessmentDocument>,
    #[serde(skip_serializing_if = "is_false")]
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListResponse {
    pub employees: Vec<EmployeeSummary>,
    #[serde(skip_serializing_if = "is_false")]
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDataResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_data: Option<AssessmentDocument>,
    #[serde(skip_serializing_if = "is_false")]
    pub degraded: bool,
}

/// Runs a save against the remote store; a transport failure is absorbed by
/// the fallback cache instead of surfacing. Returns the resulting document
/// and whether the degraded path was taken.
async fn save_with_fallback(
    state: &AppState,
    key: &str,
    employee_id: Option<u32>,
    delta: &BTreeMap<String, Value>,
    explicit_submit: bool,
) -> Result<(AssessmentDocument, bool), AppError> {
    match store::save(
        state.store.as_ref(),
        &state.catalog,
        key,
        employee_id,
        delta,
        explicit_submit,
    )
    .await
    {
        Ok(doc) => Ok((doc, false)),
        Err(SaveError::Transport { reason, merged }) => {
            warn!(key, %reason, "save hit a transport failure; absorbing into fallback cache");
            let doc = match merged {
                // The remote read succeeded before the write failed: journal
                // exactly the document that was lost.
                Some(doc) => {
                    state.fallback.absorb_json(key, &doc).await?;
                    doc
                }
                None => {
                    state
                        .fallback
                        .absorb_save(&state.catalog, key, employee_id, delta, explicit_submit)
                        .await?
                }
            };
            Ok((doc, true))
        }
        Err(SaveError::Store(e)) => Err(e.into()),
    }
}

/// GET /company-status/:org_id
pub async fn get_company_status(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Result<Json<CompanyStatusResponse>, AppError> {
    require_path_segment("orgId", &org_id)?;
    match store::get_status(state.store.as_ref(), &org_id).await {
        Ok((status, form_data)) => Ok(Json(CompanyStatusResponse {
            status,
            form_data,
            degraded: false,
        })),
        Err(StoreError::Transport(reason)) => {
            warn!(%org_id, %reason, "company status read failed; consulting fallback cache");
            let form_data = state
                .fallback
                .read_document(&keys::company_document_key(&org_id))
                .await?;
            let status = form_data
                .as_ref()
                .map(AssessmentDocument::status)
                .unwrap_or(AssessmentStatus::NotStarted);
            Ok(Json(CompanyStatusResponse {
                status,
                form_data,
                degraded: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /save-company
pub async fn save_company(
    State(state): State<AppState>,
    Json(req): Json<SaveCompanyRequest>,
) -> Result<Json<SaveResponse>, AppError> {
    require_path_segment("orgId", &req.org_id)?;
    let key = keys::company_document_key(&req.org_id);
    let (doc, degraded) =
        save_with_fallback(&state, &key, None, &req.responses, req.is_explicit_submit).await?;
    Ok(Json(SaveResponse {
        state: doc.state,
        completion_percentage: doc.completion_percentage,
        employee_id: None,
        degraded,
    }))
}

/// POST /save-employee
///
/// With an `employeeId`, overwrites that employee's document. Without one,
/// this is the first save of a new-employee session: the next id is
/// allocated (count of existing employee documents) and the session becomes
/// identified by it.
pub async fn save_employee(
    State(state): State<AppState>,
    Json(req): Json<SaveEmployeeRequest>,
) -> Result<Json<SaveResponse>, AppError> {
    require_path_segment("orgId", &req.org_id)?;

    let session = SessionState::Unresolved;
    let (session, employee_id, allocation_degraded) = match req.employee_id {
        Some(id) => (session.request_resume(id)?, id, false),
        None => {
            let session = session.begin_new()?;
            match sessions::allocate_employee_id(state.store.as_ref(), &req.org_id).await {
                Ok(id) => (session, id, false),
                Err(StoreError::Transport(reason)) => {
                    warn!(
                        org_id = %req.org_id,
                        %reason,
                        "employee id allocation fell back to the local mirror"
                    );
                    let local = state.fallback.employee_documents(&req.org_id).await?;
                    (session, local.len() as u32, true)
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let key = keys::employee_document_key(&req.org_id, employee_id);
    let (doc, save_degraded) = save_with_fallback(
        &state,
        &key,
        Some(employee_id),
        &req.responses,
        req.is_explicit_submit,
    )
    .await?;

    let session = session.identify(employee_id)?;
    debug!(
        employee_id = ?session.employee_id(),
        ready = session.ready(),
        "employee session identified"
    );

    Ok(Json(SaveResponse {
        state: doc.state,
        completion_percentage: doc.completion_percentage,
        employee_id: Some(employee_id),
        degraded: allocation_degraded || save_degraded,
    }))
}

/// GET /employee-list/:org_id
pub async fn get_employee_list(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Result<Json<EmployeeListResponse>, AppError> {
    require_path_segment("orgId", &org_id)?;
    match store::employee_list(
        state.store.as_ref(),
        &org_id,
        &state.config.display_name_question,
    )
    .await
    {
        Ok(employees) => Ok(Json(EmployeeListResponse {
            employees,
            degraded: false,
        })),
        Err(StoreError::Transport(reason)) => {
            warn!(%org_id, %reason, "employee listing failed; consulting fallback cache");
            let mut employees: Vec<_> = state
                .fallback
                .employee_documents(&org_id)
                .await?
                .iter()
                .map(|(id, doc)| store::summarize(*id, doc, &state.config.display_name_question))
                .collect();
            employees.sort_by_key(|e| e.employee_id);
            Ok(Json(EmployeeListResponse {
                employees,
                degraded: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /employee-data/:org_id/:employee_id
///
/// Resume validation: the session reaches `Identified` only when the
/// document exists; otherwise the caller gets `found: false` and the session
/// drops back to `Unresolved`.
pub async fn get_employee_data(
    State(state): State<AppState>,
    Path((org_id, employee_id)): Path<(String, u32)>,
) -> Result<Json<EmployeeDataResponse>, AppError> {
    require_path_segment("orgId", &org_id)?;
    let session = SessionState::Unresolved.request_resume(employee_id)?;
    let key = keys::employee_document_key(&org_id, employee_id);

    match store::load_document(state.store.as_ref(), &key).await {
        Ok(Some(doc)) => {
            let session = session.identify(employee_id)?;
            debug!(?session, ready = session.ready(), "employee session resumed");
            Ok(Json(EmployeeDataResponse {
                found: true,
                form_data: Some(doc),
                degraded: false,
            }))
        }
        Ok(None) => {
            debug!(%org_id, employee_id, "resume rejected: employee not found");
            let _ = session.resume_failed();
            Ok(Json(EmployeeDataResponse {
                found: false,
                form_data: None,
                degraded: false,
            }))
        }
        Err(StoreError::Transport(reason)) => {
            warn!(%org_id, employee_id, %reason, "employee read failed; consulting fallback cache");
            let form_data = state.fallback.read_document(&key).await?;
            Ok(Json(EmployeeDataResponse {
                found: form_data.is_some(),
                form_data,
                degraded: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}
