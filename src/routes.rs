use axum::{
    Router,
    extract::Request,
    http::{Method, header::CONTENT_TYPE},
    middleware,
    routing::get,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info_span;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    app_state::AppState,
    health::{self, HealthResponse},
    middleware::rate_limit_middleware,
    parse::{
        dtos::{ApiInfo, ParseFallback, ParseRequest, ParseResponse},
        handlers,
    },
};

const REQUEST_ID: &str = "x-request-id";
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

#[derive(OpenApi)]
#[openapi(
    paths(handlers::parse, handlers::api_info, health::health_check),
    components(schemas(ParseRequest, ParseResponse, ParseFallback, ApiInfo, HealthResponse)),
    tags(
        (name = "parse", description = "Turn a shared link into note content"),
        (name = "health", description = "Instance capabilities")
    )
)]
pub struct ApiDoc;

/// The full service: parse endpoints behind the rate limiter, health, and API docs.
pub fn router(state: AppState) -> Router {
    let parse_routes = Router::new()
        .route("/api/parse", get(handlers::api_info).post(handlers::parse))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(CORS_MAX_AGE);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .headers()
            .get(REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info_span!(
            "http",
            method = %request.method(),
            uri = %request.uri(),
            request_id,
        )
    });

    Router::new()
        .merge(parse_routes)
        .route("/healthz", get(health::health_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(state)
}
