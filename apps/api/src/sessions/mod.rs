//! Session identity resolution for employee actors. The session is an
//! immutable value object threaded through the request/response cycle, never
//! shared mutable state: each transition consumes the old state and returns
//! the next one.
//!
//! A "new employee" session is ready immediately (`NewPending`) so the client
//! can render questions without a server round trip; the employee id is
//! allocated on the first successful save. A returning employee supplies an
//! id, which must be validated against the assessment store before the
//! session is `Identified`. Employee id `0` is a valid id everywhere; absence
//! is always `Option::None`, never a numeric sentinel.

use thiserror::Error;

use crate::storage::{keys, ObjectStore, StoreError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session transition: {from} -> {attempted}")]
    InvalidTransition {
        from: &'static str,
        attempted: &'static str,
    },
}

/// Employee-session resolution state machine. `Identified` is terminal for
/// the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unresolved,
    NewPending,
    ResumeRequested { employee_id: u32 },
    Identified { employee_id: u32 },
}

impl SessionState {
    /// Ready means the client may render and answer questions: a fresh
    /// session awaiting its first save, or a validated returning one.
    pub fn ready(&self) -> bool {
        matches!(
            self,
            SessionState::NewPending | SessionState::Identified { .. }
        )
    }

    pub fn employee_id(&self) -> Option<u32> {
        match self {
            SessionState::ResumeRequested { employee_id }
            | SessionState::Identified { employee_id } => Some(*employee_id),
            _ => None,
        }
    }

    /// Unresolved -> NewPending: the actor chose "new employee".
    pub fn begin_new(self) -> Result<SessionState, SessionError> {
        match self {
            SessionState::Unresolved => Ok(SessionState::NewPending),
            other => Err(invalid(other, "NewPending")),
        }
    }

    /// Unresolved -> ResumeRequested: the actor supplied an existing id.
    pub fn request_resume(self, employee_id: u32) -> Result<SessionState, SessionError> {
        match self {
            SessionState::Unresolved => Ok(SessionState::ResumeRequested { employee_id }),
            other => Err(invalid(other, "ResumeRequested")),
        }
    }

    /// NewPending -> Identified (first successful save assigned the id) or
    /// ResumeRequested -> Identified (the store confirmed the document).
    pub fn identify(self, employee_id: u32) -> Result<SessionState, SessionError> {
        match self {
            SessionState::NewPending => Ok(SessionState::Identified { employee_id }),
            SessionState::ResumeRequested {
                employee_id: requested,
            } if requested == employee_id => Ok(SessionState::Identified { employee_id }),
            other => Err(invalid(other, "Identified")),
        }
    }

    /// ResumeRequested -> Unresolved: the supplied id did not exist. The
    /// caller reports `EmployeeNotFound`; the session may retry.
    pub fn resume_failed(self) -> SessionState {
        SessionState::Unresolved
    }

    fn name(&self) -> &'static str {
        match self {
            SessionState::Unresolved => "Unresolved",
            SessionState::NewPending => "NewPending",
            SessionState::ResumeRequested { .. } => "ResumeRequested",
            SessionState::Identified { .. } => "Identified",
        }
    }
}

fn invalid(from: SessionState, attempted: &'static str) -> SessionError {
    SessionError::InvalidTransition {
        from: from.name(),
        attempted,
    }
}

impl From<SessionError> for crate::errors::AppError {
    fn from(err: SessionError) -> Self {
        crate::errors::AppError::Internal(anyhow::anyhow!(err))
    }
}

/// Next employee id for an organization: the count of existing employee
/// documents. Ids are assigned exactly once and never reused.
pub async fn allocate_employee_id(
    store: &dyn ObjectStore,
    org_id: &str,
) -> Result<u32, StoreError> {
    let existing = store.list(&keys::employee_document_prefix(org_id)).await?;
    let count = existing
        .iter()
        .filter(|key| keys::employee_id_from_document_key(key).is_some())
        .count();
    Ok(count as u32)
}

/// Confirms an employee document exists before a resume is accepted.
pub async fn validate_resume(
    store: &dyn ObjectStore,
    org_id: &str,
    employee_id: u32,
) -> Result<bool, StoreError> {
    match store
        .get(&keys::employee_document_key(org_id, employee_id))
        .await
    {
        Ok(_) => Ok(true),
        Err(StoreError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
