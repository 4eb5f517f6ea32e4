use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

use crate::{
    ai::{AiCache, AiClient, AiError, AiOptions, Categorization},
    extractor::{
        AiEnhancedContent, ContentDraft, ContentType, ExtractedContent, GenericExtractor,
        PageExtractor, Platform, cleaner::char_prefix, dates::parse_date, platform_extractor,
    },
    retry::{RetryPolicy, with_retry},
};

/// HTML sent to the model is cut to this many characters.
pub const HTML_BUDGET_CHARS: usize = 8000;

const EXTRACT_SCOPE: &str = "extract";

pub const DEFAULT_AI_RETRY: RetryPolicy = RetryPolicy::exponential(3, Duration::from_secs(1));

/// Model-backed extraction and enhancement on top of an [`AiClient`].
#[derive(Clone)]
pub struct AiExtractor {
    client: Arc<dyn AiClient>,
    cache: Option<Arc<dyn AiCache>>,
    retry: RetryPolicy,
}

impl AiExtractor {
    pub fn new(client: Arc<dyn AiClient>) -> Self {
        Self {
            client,
            cache: None,
            retry: DEFAULT_AI_RETRY,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn AiCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_available(&self) -> bool {
        self.client.is_available()
    }

    /// Asks the model to read raw HTML. Schema mismatches are not retried.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn extract_from_html(
        &self,
        html: &str,
        url: &str,
        platform: Platform,
    ) -> Result<ExtractedContent, AiError> {
        if !self.is_available() {
            return Err(AiError::Unavailable("ai extraction is disabled".into()));
        }

        let scoped_html = format!("{EXTRACT_SCOPE}\n{html}");
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(url, Some(&scoped_html))) {
            debug!("AI extraction served from cache");
            return Ok(cached.into_base());
        }

        let budgeted = char_prefix(html, HTML_BUDGET_CHARS);
        let raw = with_retry(
            self.retry,
            || self.client.extract_structured(budgeted, url),
            AiError::is_transient,
        )
        .await?;

        let filter = match platform_extractor(platform) {
            Some(page) => page.image_filter(url),
            None => GenericExtractor::default().image_filter(url),
        };
        let images = raw
            .images
            .iter()
            .filter_map(|candidate| filter.accept(candidate))
            .collect();

        let fallback = Platform::Unknown;
        let content = ExtractedContent::new(
            platform,
            url,
            ContentDraft {
                title: raw
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| Some(fallback.placeholder_title().to_string())),
                body: raw
                    .content
                    .filter(|b| !b.trim().is_empty())
                    .or_else(|| Some(fallback.placeholder_body().to_string())),
                images,
                author: raw.author,
                published_at: raw.published_at.as_deref().and_then(parse_date),
            },
        );

        if let Some(cache) = &self.cache {
            cache.set(url, Some(&scoped_html), AiEnhancedContent::enhanced(content.clone()));
        }
        info!(images = content.images().len(), "AI extraction succeeded");
        Ok(content)
    }

    /// Adds summary, optimized title and categorization. The three calls run
    /// concurrently and each one that fails simply leaves its field unset.
    #[instrument(skip_all, fields(url = %content.source_url()))]
    pub async fn enhance(&self, content: ExtractedContent, options: &AiOptions) -> AiEnhancedContent {
        if !self.is_available() || !options.any() {
            return AiEnhancedContent::unenhanced(content);
        }

        let url = content.source_url().to_string();
        let body = content.body().to_string();
        let scoped_body = format!("{}\n{body}", options.cache_scope());
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&url, Some(&scoped_body))) {
            debug!("AI enhancement served from cache");
            return cached.with_base(content);
        }

        let title = content.title().to_string();
        let (summary, optimized_title, categorization) = tokio::join!(
            self.optional(options.enable_summary, "summary", || self.client.summarize(&body)),
            self.optional(options.enable_title_optimization, "title", || {
                self.client.optimize_title(&title, &body)
            }),
            self.optional(options.enable_categorization, "categorization", || {
                self.client.categorize(&body)
            }),
        );

        let mut enhanced = AiEnhancedContent::enhanced(content);
        enhanced.summary = summary.filter(|s| !s.trim().is_empty());
        enhanced.optimized_title = optimized_title.filter(|t| !t.trim().is_empty());
        if let Some(Categorization {
            content_type,
            categories,
            tags,
        }) = categorization
        {
            enhanced.set_categorization(ContentType::from_label(&content_type), categories, tags);
        }

        if let Some(cache) = &self.cache {
            cache.set(&url, Some(&scoped_body), enhanced.clone());
        }
        enhanced
    }

    /// Enhances several results concurrently.
    pub async fn batch_enhance(
        &self,
        contents: Vec<ExtractedContent>,
        options: &AiOptions,
    ) -> Vec<AiEnhancedContent> {
        futures::future::join_all(contents.into_iter().map(|content| self.enhance(content, options))).await
    }

    async fn optional<T, F, Fut>(&self, enabled: bool, task: &'static str, op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        if !enabled {
            return None;
        }
        match with_retry(self.retry, op, AiError::is_transient).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(task, error = %e, "AI enhancement task failed");
                None
            }
        }
    }
}
