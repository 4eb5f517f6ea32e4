//! The fallback chain: platform extractor, generic extractor, then the model.

pub mod orchestrator;
pub mod state;
pub mod strategy;

use std::sync::Arc;
use tracing::info;

use crate::{
    ai::{AiClient, AiExtractor, DisabledAiClient, MemoryAiCache, OpenAiCompatClient},
    config::{Config, environment::RuntimeEnvironment},
    errors::ExtractError,
    fetcher::{FetchExtractor, HttpFetcher},
};

pub use orchestrator::{ExtractionOrchestrator, OrchestratorBuilder};
pub use state::{Capabilities, Outcome, Stage, next_stage};
pub use strategy::{AiStrategy, ExtractionStrategy, GenericStrategy, PlatformStrategy};

/// Wires the production collaborators for this process.
pub fn from_config(
    config: &Config,
    env: &RuntimeEnvironment,
) -> Result<ExtractionOrchestrator, ExtractError> {
    let fetcher = FetchExtractor::new(HttpFetcher::new()?);

    let client: Arc<dyn AiClient> = match config.llm() {
        Some(llm) => Arc::new(OpenAiCompatClient::new(llm.clone())?),
        None => Arc::new(DisabledAiClient),
    };
    let cache = Arc::new(MemoryAiCache::new(
        config.ai_cache_ttl(),
        config.ai_cache_max_entries(),
    ));
    let ai = AiExtractor::new(client).with_cache(cache);

    #[cfg_attr(not(feature = "headless"), allow(unused_mut))]
    let mut builder = ExtractionOrchestrator::builder()
        .fetcher(fetcher)
        .ai(ai)
        .smart_platforms(config.smart_ai_platforms().to_vec());

    #[cfg(feature = "headless")]
    if env.headless_browser_available() {
        use crate::browser::{HeadlessBrowserExtractor, chromium::ChromiumDriver};

        let driver = ChromiumDriver::new(config.chrome_executable().cloned());
        builder = builder.headless(Some(Arc::new(HeadlessBrowserExtractor::new(Arc::new(
            driver,
        )))));
    }

    let orchestrator = builder.build()?;
    info!(
        runtime = ?env.kind,
        headless = orchestrator.headless_available(),
        ai = orchestrator.ai_available(),
        "Extraction pipeline ready"
    );
    Ok(orchestrator)
}
