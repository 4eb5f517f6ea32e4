use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use std::sync::Arc;

use notelink::{
    ExtractionOrchestrator,
    app_state::AppState,
    config::{Config, environment::RuntimeEnvironment},
    middleware::RateLimit,
    retry::RetryPolicy,
    routes,
    safety::AllowAll,
};

/// An orchestrator that may reach the local mock server and never waits between retries.
pub fn local_orchestrator() -> ExtractionOrchestrator {
    ExtractionOrchestrator::builder()
        .gate(Arc::new(AllowAll))
        .retry(RetryPolicy::none())
        .build()
        .unwrap()
}

pub fn test_state(orchestrator: ExtractionOrchestrator) -> AppState {
    let environment = RuntimeEnvironment::from_lookup(|_| None);
    AppState::new(Arc::new(orchestrator), environment, &Config::default())
}

pub fn test_app(orchestrator: ExtractionOrchestrator) -> Router {
    routes::router(test_state(orchestrator))
}

pub fn rate_limited_app(orchestrator: ExtractionOrchestrator, max_requests: u32) -> Router {
    let state = AppState {
        rate_limit: RateLimit::new(max_requests, 60),
        ..test_state(orchestrator)
    };
    routes::router(state)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
