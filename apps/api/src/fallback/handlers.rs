use axum::{extract::State, Json};
use tracing::info;

use crate::errors::AppError;
use crate::fallback::ReconcileReport;
use crate::state::AppState;

/// POST /reconcile
///
/// Explicit, caller-triggered replay of journalled fallback writes. Never
/// runs implicitly.
pub async fn reconcile(State(state): State<AppState>) -> Result<Json<ReconcileReport>, AppError> {
    let report = state.fallback.reconcile(state.store.as_ref()).await?;
    info!(
        replayed = report.replayed,
        failed = report.failed,
        remaining = report.remaining,
        "reconciliation pass finished"
    );
    Ok(Json(report))
}
