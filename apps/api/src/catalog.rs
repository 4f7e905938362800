//! The question catalog is externally owned (the UI renders it from static
//! definitions); this core consumes it read-only to compute completion
//! metrics and the all-required-answered check.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One question descriptor from the external catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDef {
    pub id: String,
    #[serde(default)]
    pub required: bool,
}

/// Ordered list of question descriptors. Empty when unconfigured, in which
/// case completion percentage stays at zero and the required-question check
/// is vacuously satisfied.
#[derive(Debug, Clone, Default)]
pub struct QuestionCatalog {
    questions: Vec<QuestionDef>,
}

impl QuestionCatalog {
    pub fn new(questions: Vec<QuestionDef>) -> Self {
        Self { questions }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .with_context(|| format!("read question catalog at {}", path.display()))?;
        let questions: Vec<QuestionDef> = serde_json::from_slice(&raw)
            .with_context(|| format!("parse question catalog at {}", path.display()))?;
        Ok(Self::new(questions))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn questions(&self) -> &[QuestionDef] {
        &self.questions
    }

    pub fn required_ids(&self) -> impl Iterator<Item = &str> {
        self.questions
            .iter()
            .filter(|q| q.required)
            .map(|q| q.id.as_str())
    }
}

/// An answer counts as answered when present and non-empty.
pub fn is_answered(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(_) => true,
    }
}
