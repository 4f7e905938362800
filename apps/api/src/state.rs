use std::sync::Arc;

use crate::catalog::QuestionCatalog;
use crate::config::Config;
use crate::fallback::LocalCache;
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Object store behind a trait so tests can swap in an in-memory double.
    pub store: Arc<dyn ObjectStore>,
    /// Local mirror that absorbs writes when the remote store is unreachable.
    pub fallback: Arc<LocalCache>,
    /// Externally-owned question catalog, consumed read-only for completion metrics.
    pub catalog: Arc<QuestionCatalog>,
    pub config: Config,
}
