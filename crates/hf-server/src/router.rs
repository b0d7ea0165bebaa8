//! Axum router construction.

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::hls::playlist,
        routes::jobs::list_jobs,
        routes::admin::tools,
    ),
    components(schemas(
        routes::health::HealthResponse,
        crate::jobs::JobSnapshot,
        crate::jobs::JobKind,
        hf_core::SegmentContainer,
        hf_av::ToolInfo,
    ))
)]
pub struct ApiDoc;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/hls/playlist.m3u8", get(routes::hls::playlist))
        .route("/jobs", get(routes::jobs::list_jobs))
        .route("/admin/tools", get(routes::admin::tools))
        .route("/openapi.json", get(openapi));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
