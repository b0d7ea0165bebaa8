//! Job inspection route handlers.

use axum::extract::State;
use axum::Json;

use crate::context::AppContext;
use crate::jobs::JobSnapshot;

/// GET /api/jobs
#[utoipa::path(
    get,
    path = "/api/jobs",
    responses(
        (status = 200, description = "Tracked segmenting jobs", body = Vec<JobSnapshot>)
    )
)]
pub async fn list_jobs(State(ctx): State<AppContext>) -> Json<Vec<JobSnapshot>> {
    Json(ctx.jobs.snapshot())
}
