pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::assessments::handlers as assessments;
use crate::fallback::handlers as fallback;
use crate::state::AppState;
use crate::uploads::handlers as uploads;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Upload broker
        .route("/presigned-url", post(uploads::issue_presigned_url))
        .route(
            "/file-registry",
            post(uploads::register_file).get(uploads::list_files),
        )
        .route("/file/:entry_id", delete(uploads::delete_file))
        // Assessment store
        .route(
            "/company-status/:org_id",
            get(assessments::get_company_status),
        )
        .route(
            "/employee-list/:org_id",
            get(assessments::get_employee_list),
        )
        .route(
            "/employee-data/:org_id/:employee_id",
            get(assessments::get_employee_data),
        )
        .route("/save-company", post(assessments::save_company))
        .route("/save-employee", post(assessments::save_employee))
        // Fallback cache
        .route("/reconcile", post(fallback::reconcile))
        .with_state(state)
}
