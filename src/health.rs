use axum::{Json, extract::State};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::{
    app_state::AppState,
    config::environment::RuntimeEnvironment,
    extractor::{Platform, supported_platforms},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    version: String,
    runtime: RuntimeEnvironment,
    headless_browser: bool,
    ai_extraction: bool,
    ai_enhancement: bool,
    supported_platforms: Vec<Platform>,
}

/// Reports what this instance can do; the service is healthy as long as it answers.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Capability report", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    let response = HealthResponse {
        status: "OK".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        runtime: state.environment,
        headless_browser: orchestrator.headless_available(),
        ai_extraction: orchestrator.ai_available(),
        ai_enhancement: orchestrator.enhancement_available(),
        supported_platforms: supported_platforms().to_vec(),
    };
    debug!(?response, "Health check");
    Json(response)
}
