//! Admin route handlers.

use axum::extract::State;
use axum::Json;

use crate::context::AppContext;

/// GET /api/admin/tools
#[utoipa::path(
    get,
    path = "/api/admin/tools",
    responses(
        (status = 200, description = "List external tool availability", body = Vec<hf_av::ToolInfo>)
    )
)]
pub async fn tools(State(ctx): State<AppContext>) -> Json<Vec<hf_av::ToolInfo>> {
    Json(ctx.tools.check_all().await)
}
