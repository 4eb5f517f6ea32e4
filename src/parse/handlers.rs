use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::{
    app_state::AppState,
    errors::ExtractError,
    extractor::{AiEnhancedContent, supported_platforms},
    formatter::OutputFormat,
    parse::dtos::{ApiInfo, ParseRequest, ParseResponse},
};

const PARSE_CACHE_CONTROL: &str = "public, max-age=300, s-maxage=600";
const INFO_CACHE_CONTROL: &str = "public, max-age=3600";

fn bad_request(error: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ParseResponse::failure(error))).into_response()
}

fn status_for(err: &ExtractError) -> StatusCode {
    match err {
        ExtractError::Validation(_) | ExtractError::Rejected(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[utoipa::path(
    post,
    path = "/api/parse",
    tag = "parse",
    request_body = ParseRequest,
    responses(
        (status = 200, description = "Content extracted", body = ParseResponse),
        (status = 400, description = "Missing URL, bad output format or disallowed address", body = ParseResponse),
        (status = 429, description = "Rate limit exceeded", body = ParseResponse),
        (status = 500, description = "Every extraction strategy failed", body = ParseResponse)
    )
)]
pub async fn parse(
    State(state): State<AppState>,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Response {
    let mut payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let format = match payload.output_format() {
        Ok(format) => format,
        Err(error) => return bad_request(error),
    };
    let url = match payload.target_url() {
        Ok(url) => url,
        Err(error) => return bad_request(error),
    };

    payload
        .options
        .timeout_ms
        .get_or_insert(state.request_timeout.as_millis() as u64);

    let orchestrator = &state.orchestrator;
    let result = if payload.ai_enhance && orchestrator.enhancement_available() {
        orchestrator
            .smart_extract(&url, &payload.options, &payload.ai_options)
            .await
    } else {
        orchestrator
            .extract(&url, &payload.options)
            .await
            .map(AiEnhancedContent::unenhanced)
    };

    match result {
        Ok(content) => {
            info!(
                %url,
                platform = %content.base().platform(),
                enhanced = content.enhanced,
                "Parsed"
            );
            let ios_url = format.deep_link(&content);
            (
                StatusCode::OK,
                [(CACHE_CONTROL, PARSE_CACHE_CONTROL)],
                Json(ParseResponse::success(content, ios_url)),
            )
                .into_response()
        }
        Err(err) => {
            warn!(%url, category = %err.category(), error = %err, "Parse failed");
            (status_for(&err), Json(ParseResponse::from_error(&err))).into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/parse",
    tag = "parse",
    responses(
        (status = 200, description = "What this endpoint accepts", body = ApiInfo)
    )
)]
pub async fn api_info(State(state): State<AppState>) -> Response {
    let info = ApiInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "把社交平台和网页链接解析成可直接存入笔记应用的内容".to_string(),
        supported_platforms: supported_platforms().to_vec(),
        output_formats: vec![OutputFormat::Flomo, OutputFormat::Notes, OutputFormat::Raw],
        ai_available: state.orchestrator.enhancement_available(),
        smart_ai_platforms: state.orchestrator.smart_platforms().to_vec(),
    };
    ([(CACHE_CONTROL, INFO_CACHE_CONTROL)], Json(info)).into_response()
}
