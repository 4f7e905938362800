use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{is_answered, QuestionCatalog};

/// Persisted lifecycle state of an assessment document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentState {
    New,
    InProgress,
    Completed,
}

/// Externally reported status. `NotStarted` means no document has ever been
/// saved for the identity; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentStatus {
    #[serde(rename = "not-started")]
    NotStarted,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

/// One questionnaire response document, keyed by organization id (company
/// scope) or (organization id, employee id). Persisted as a whole JSON object;
/// merges happen in memory before the overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDocument {
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
    pub state: AssessmentState,
    pub completion_percentage: u8,
    pub last_modified: DateTime<Utc>,
    /// Completed documents stay editable.
    pub can_modify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<u32>,
}

impl AssessmentDocument {
    pub fn new(employee_id: Option<u32>) -> Self {
        Self {
            responses: BTreeMap::new(),
            state: AssessmentState::New,
            completion_percentage: 0,
            last_modified: Utc::now(),
            can_modify: true,
            employee_id,
        }
    }

    /// Merges a response delta (delta wins on key collisions), recomputes the
    /// completion percentage, and applies the submit rule: `completed` is
    /// reached only via an explicit submit with every required question
    /// answered, and is sticky once reached. A partial save that happens to
    /// answer everything stays `in_progress`.
    pub fn apply_delta(
        &mut self,
        delta: &BTreeMap<String, Value>,
        catalog: &QuestionCatalog,
        explicit_submit: bool,
    ) {
        for (question_id, answer) in delta {
            self.responses.insert(question_id.clone(), answer.clone());
        }
        self.completion_percentage = completion_percentage(&self.responses, catalog);
        let required_done = catalog
            .required_ids()
            .all(|id| is_answered(self.responses.get(id)));
        self.state = if self.state == AssessmentState::Completed
            || (explicit_submit && required_done)
        {
            AssessmentState::Completed
        } else {
            AssessmentState::InProgress
        };
        self.last_modified = Utc::now();
    }

    pub fn status(&self) -> AssessmentStatus {
        match self.state {
            AssessmentState::Completed => AssessmentStatus::Completed,
            _ => AssessmentStatus::InProgress,
        }
    }
}

/// `(answered questions / total questions) * 100` against the external
/// catalog; zero when the catalog is empty.
pub fn completion_percentage(
    responses: &BTreeMap<String, Value>,
    catalog: &QuestionCatalog,
) -> u8 {
    let total = catalog.len();
    if total == 0 {
        return 0;
    }
    let answered = catalog
        .questions()
        .iter()
        .filter(|q| is_answered(responses.get(q.id.as_str())))
        .count();
    ((answered * 100) / total) as u8
}
