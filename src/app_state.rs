use std::{sync::Arc, time::Duration};

use crate::{
    config::{Config, environment::RuntimeEnvironment},
    middleware::rate_limit::RateLimit,
    pipeline::ExtractionOrchestrator,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ExtractionOrchestrator>,
    pub environment: RuntimeEnvironment,
    pub rate_limit: RateLimit,
    /// Applied when a request does not set its own `timeoutMs`.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<ExtractionOrchestrator>,
        environment: RuntimeEnvironment,
        config: &Config,
    ) -> Self {
        Self {
            orchestrator,
            environment,
            rate_limit: RateLimit::from_config(config),
            request_timeout: config.request_timeout(),
        }
    }
}
