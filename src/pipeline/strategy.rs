use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::{
    ai::AiExtractor,
    browser::headless::HeadlessBrowserExtractor,
    errors::{ErrorCategory, ExtractError},
    extractor::{
        ExtractedContent, ExtractionOptions, GenericExtractor, LoadStrategy, PageExtractor,
        Platform, platform_extractor,
    },
    fetcher::FetchExtractor,
};

/// One rung of the fallback chain.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, url: &str, platform: Platform) -> bool;

    /// Whether the strategy can run at all in this process.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether the loaders behind this strategy already retry transient
    /// failures. The orchestrator then runs it once per stage.
    fn retries_internally(&self) -> bool {
        false
    }

    async fn extract(
        &self,
        url: &str,
        platform: Platform,
        options: &ExtractionOptions,
    ) -> Result<ExtractedContent, ExtractError>;
}

/// A platform's own extractor, loading the page by HTTP or headless browser
/// according to the platform's preference and what the host allows.
pub struct PlatformStrategy {
    page: Arc<dyn PageExtractor>,
    fetcher: FetchExtractor,
    headless: Option<Arc<HeadlessBrowserExtractor>>,
}

impl PlatformStrategy {
    pub fn new(
        page: Arc<dyn PageExtractor>,
        fetcher: FetchExtractor,
        headless: Option<Arc<HeadlessBrowserExtractor>>,
    ) -> Self {
        Self {
            page,
            fetcher,
            headless,
        }
    }

    fn wants_headless_first(&self, options: &ExtractionOptions) -> bool {
        options.force_headless_browser || self.page.load_strategy() == LoadStrategy::HeadlessFirst
    }
}

#[async_trait]
impl ExtractionStrategy for PlatformStrategy {
    fn name(&self) -> &str {
        self.page.platform().as_str()
    }

    fn can_handle(&self, url: &str, platform: Platform) -> bool {
        platform == self.page.platform() && self.page.can_handle(url)
    }

    fn retries_internally(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(url = %url, platform = %self.page.platform()))]
    async fn extract(
        &self,
        url: &str,
        _platform: Platform,
        options: &ExtractionOptions,
    ) -> Result<ExtractedContent, ExtractError> {
        if let Some(html) = options.preloaded() {
            return Ok(self.page.extract(html, url));
        }

        let url = if self.page.resolves_short_link(url) {
            self.fetcher.resolve_short_link(url, options).await
        } else {
            url.to_string()
        };

        let Some(headless) = self.headless.as_ref().filter(|h| !h.is_closed()) else {
            return self.fetcher.extract(&url, options, self.page.as_ref()).await;
        };

        if self.wants_headless_first(options) {
            match headless.extract(&url, options, self.page.as_ref()).await {
                Ok(content) => Ok(content),
                Err(e) => {
                    warn!(error = %e, "Headless render failed, falling back to HTTP fetch");
                    self.fetcher.extract(&url, options, self.page.as_ref()).await
                }
            }
        } else {
            match self.fetcher.extract(&url, options, self.page.as_ref()).await {
                Ok(content) => Ok(content),
                Err(e) if e.category().is_transient() || e.category() == ErrorCategory::AuthWall => {
                    debug!(error = %e, "HTTP fetch failed, rendering in headless browser");
                    headless.extract(&url, options, self.page.as_ref()).await
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// Site-agnostic extraction over plain HTTP.
pub struct GenericStrategy {
    fetcher: FetchExtractor,
}

impl GenericStrategy {
    pub fn new(fetcher: FetchExtractor) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ExtractionStrategy for GenericStrategy {
    fn name(&self) -> &str {
        "generic"
    }

    fn can_handle(&self, url: &str, _platform: Platform) -> bool {
        GenericExtractor::default().can_handle(url)
    }

    fn retries_internally(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        url: &str,
        platform: Platform,
        options: &ExtractionOptions,
    ) -> Result<ExtractedContent, ExtractError> {
        let page = GenericExtractor::for_platform(platform);
        self.fetcher.extract(url, options, &page).await
    }
}

/// Last resort: the model reads the raw HTML.
pub struct AiStrategy {
    ai: AiExtractor,
    fetcher: FetchExtractor,
}

impl AiStrategy {
    pub fn new(ai: AiExtractor, fetcher: FetchExtractor) -> Self {
        Self { ai, fetcher }
    }
}

#[async_trait]
impl ExtractionStrategy for AiStrategy {
    fn name(&self) -> &str {
        "ai"
    }

    fn can_handle(&self, _url: &str, _platform: Platform) -> bool {
        self.ai.is_available()
    }

    fn is_available(&self) -> bool {
        self.ai.is_available()
    }

    fn retries_internally(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        url: &str,
        platform: Platform,
        options: &ExtractionOptions,
    ) -> Result<ExtractedContent, ExtractError> {
        let headers = platform_extractor(platform)
            .map(|page| page.request_headers())
            .unwrap_or_default();
        let html = self.fetcher.load_html(url, options, headers).await?;
        Ok(self.ai.extract_from_html(&html, url, platform).await?)
    }
}
