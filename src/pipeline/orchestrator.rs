use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    ai::{AiExtractor, AiOptions},
    browser::headless::HeadlessBrowserExtractor,
    errors::{ErrorCategory, ExtractError, StrategyFailure},
    extractor::{
        AiEnhancedContent, ExtractedContent, ExtractionOptions, Platform, detect_platform,
        platform_extractor,
    },
    fetcher::{FetchExtractor, HttpFetcher, client::DEFAULT_RETRY},
    pipeline::{
        state::{Capabilities, Outcome, Stage, next_stage},
        strategy::{AiStrategy, ExtractionStrategy, GenericStrategy, PlatformStrategy},
    },
    retry::{RetryPolicy, with_retry},
    safety::{SsrfGuard, UrlGate, sanitize_url},
};

/// Three attempts per stage, exponential from one second.
pub const DEFAULT_STAGE_RETRY: RetryPolicy = RetryPolicy::exponential(3, Duration::from_secs(1));

const AI_UNAVAILABLE: &str = "AI extraction unavailable";

/// Runs the platform, generic and AI strategies in order until one succeeds.
pub struct ExtractionOrchestrator {
    gate: Arc<dyn UrlGate>,
    platform_strategies: Vec<Arc<dyn ExtractionStrategy>>,
    generic: Arc<dyn ExtractionStrategy>,
    ai_strategy: Option<Arc<dyn ExtractionStrategy>>,
    ai: Option<AiExtractor>,
    headless: Option<Arc<HeadlessBrowserExtractor>>,
    retry: RetryPolicy,
    smart_platforms: Vec<Platform>,
}

impl ExtractionOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Whether the AI fallback stage can run.
    pub fn ai_available(&self) -> bool {
        self.ai_strategy.as_ref().is_some_and(|s| s.is_available())
    }

    /// Whether results can be enhanced with summaries, titles and tags.
    pub fn enhancement_available(&self) -> bool {
        self.ai.as_ref().is_some_and(AiExtractor::is_available)
    }

    pub fn headless_available(&self) -> bool {
        self.headless.as_ref().is_some_and(|h| !h.is_closed())
    }

    pub fn smart_platforms(&self) -> &[Platform] {
        &self.smart_platforms
    }

    /// Releases the headless browser; later renders fall back to HTTP.
    pub fn close(&self) {
        if let Some(headless) = &self.headless {
            headless.close();
        }
    }

    fn admit(&self, url: &str) -> Result<String, ExtractError> {
        let url = url.trim();
        if let Err(e) = Url::parse(url) {
            return Err(ExtractError::Validation(format!("invalid url '{url}': {e}")));
        }
        if !self.gate.is_safe(url) {
            return Err(ExtractError::Rejected(url.to_string()));
        }
        Ok(sanitize_url(url))
    }

    async fn attempt(
        &self,
        strategy: &dyn ExtractionStrategy,
        url: &str,
        platform: Platform,
        options: &ExtractionOptions,
    ) -> Result<ExtractedContent, ExtractError> {
        let policy = if strategy.retries_internally() {
            RetryPolicy::none()
        } else {
            self.retry
        };
        with_retry(
            policy,
            || strategy.extract(url, platform, options),
            ExtractError::is_transient,
        )
        .await
    }

    /// Extracts `url` through the fallback chain. When every stage fails the
    /// error lists each strategy that was tried.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn extract(
        &self,
        url: &str,
        options: &ExtractionOptions,
    ) -> Result<ExtractedContent, ExtractError> {
        let url = self.admit(url)?;
        let platform = detect_platform(&url);
        let platform_strategy = self
            .platform_strategies
            .iter()
            .find(|s| s.can_handle(&url, platform))
            .cloned();
        let caps = Capabilities {
            platform_extractor: platform_strategy.is_some(),
            ai_available: self.ai_available(),
        };

        let mut attempts = Vec::new();
        let mut stage = next_stage(Stage::NotStarted, Outcome::Start, caps);

        while !stage.is_terminal() {
            let strategy = match stage {
                Stage::PlatformExtraction => platform_strategy.clone(),
                Stage::GenericFallback => Some(self.generic.clone()),
                Stage::AiFallback => self.ai_strategy.clone(),
                Stage::NotStarted | Stage::Done | Stage::Failed => None,
            };
            let Some(strategy) = strategy else {
                break;
            };

            debug!(%stage, strategy = strategy.name(), %platform, "Running extraction stage");
            match self.attempt(strategy.as_ref(), &url, platform, options).await {
                Ok(content) => {
                    info!(%stage, strategy = strategy.name(), images = content.images().len(), "Extraction succeeded");
                    return Ok(content);
                }
                Err(e) => {
                    let category = e.category();
                    warn!(%stage, strategy = strategy.name(), %category, error = %e, "Extraction stage failed");
                    attempts.push(e.as_failure(strategy.name()));

                    let next = next_stage(stage, Outcome::Failed(category), caps);
                    if stage == Stage::GenericFallback
                        && next == Stage::Failed
                        && category != ErrorCategory::Validation
                        && !caps.ai_available
                    {
                        attempts.push(StrategyFailure {
                            strategy: "ai".to_string(),
                            category: ErrorCategory::Validation,
                            message: AI_UNAVAILABLE.to_string(),
                        });
                    }
                    stage = next;
                }
            }
        }

        Err(ExtractError::AllStrategiesFailed { attempts })
    }

    /// Extracts, then enhances when a model is configured.
    pub async fn extract_with_ai(
        &self,
        url: &str,
        options: &ExtractionOptions,
        ai_options: &AiOptions,
    ) -> Result<AiEnhancedContent, ExtractError> {
        let content = self.extract(url, options).await?;
        Ok(match &self.ai {
            Some(ai) => ai.enhance(content, ai_options).await,
            None => AiEnhancedContent::unenhanced(content),
        })
    }

    /// For allow-listed platforms, lets the model read the page first and
    /// falls back to [`Self::extract_with_ai`] when that fails.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn smart_extract(
        &self,
        url: &str,
        options: &ExtractionOptions,
        ai_options: &AiOptions,
    ) -> Result<AiEnhancedContent, ExtractError> {
        let admitted = self.admit(url)?;
        let platform = detect_platform(&admitted);

        if self.smart_platforms.contains(&platform)
            && let (Some(ai), Some(strategy)) = (&self.ai, &self.ai_strategy)
            && ai.is_available()
        {
            match self.attempt(strategy.as_ref(), &admitted, platform, options).await {
                Ok(content) => return Ok(ai.enhance(content, ai_options).await),
                Err(e) => warn!(%platform, error = %e, "AI-first extraction failed, using the regular chain"),
            }
        }

        self.extract_with_ai(&admitted, options, ai_options).await
    }
}

/// Assembles an orchestrator; anything not supplied gets the production default.
pub struct OrchestratorBuilder {
    gate: Arc<dyn UrlGate>,
    fetcher: Option<FetchExtractor>,
    headless: Option<Arc<HeadlessBrowserExtractor>>,
    ai: Option<AiExtractor>,
    retry: RetryPolicy,
    smart_platforms: Vec<Platform>,
    platform_strategies: Option<Vec<Arc<dyn ExtractionStrategy>>>,
    generic: Option<Arc<dyn ExtractionStrategy>>,
    ai_strategy: Option<Arc<dyn ExtractionStrategy>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            gate: Arc::new(SsrfGuard),
            fetcher: None,
            headless: None,
            ai: None,
            retry: DEFAULT_STAGE_RETRY,
            smart_platforms: vec![Platform::Xiaohongshu],
            platform_strategies: None,
            generic: None,
            ai_strategy: None,
        }
    }
}

impl OrchestratorBuilder {
    pub fn gate(mut self, gate: Arc<dyn UrlGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn fetcher(mut self, fetcher: FetchExtractor) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// `None` keeps every load on plain HTTP.
    pub fn headless(mut self, headless: Option<Arc<HeadlessBrowserExtractor>>) -> Self {
        self.headless = headless;
        self
    }

    pub fn ai(mut self, ai: AiExtractor) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn smart_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.smart_platforms = platforms;
        self
    }

    /// Replaces the built-in platform strategies; may be called repeatedly.
    pub fn platform_strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.platform_strategies
            .get_or_insert_with(Vec::new)
            .push(strategy);
        self
    }

    pub fn generic_strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.generic = Some(strategy);
        self
    }

    pub fn ai_strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.ai_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> Result<ExtractionOrchestrator, ExtractError> {
        let Self {
            gate,
            fetcher,
            headless,
            ai,
            retry,
            smart_platforms,
            platform_strategies,
            generic,
            ai_strategy,
        } = self;

        let fetcher = match fetcher {
            Some(fetcher) => fetcher,
            None => FetchExtractor::new(HttpFetcher::with_gate(DEFAULT_RETRY, gate.clone())?),
        };

        let platform_strategies = platform_strategies.unwrap_or_else(|| {
            Platform::SUPPORTED
                .iter()
                .filter_map(|platform| platform_extractor(*platform))
                .map(|page| {
                    Arc::new(PlatformStrategy::new(page, fetcher.clone(), headless.clone()))
                        as Arc<dyn ExtractionStrategy>
                })
                .collect()
        });
        let generic = generic.unwrap_or_else(|| Arc::new(GenericStrategy::new(fetcher.clone())));
        let ai_strategy = ai_strategy.or_else(|| {
            ai.clone()
                .map(|ai| Arc::new(AiStrategy::new(ai, fetcher.clone())) as Arc<dyn ExtractionStrategy>)
        });

        Ok(ExtractionOrchestrator {
            gate,
            platform_strategies,
            generic,
            ai_strategy,
            ai,
            headless,
            retry,
            smart_platforms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ai::{Categorization, MockAiClient, RawExtraction},
        extractor::ContentDraft,
        safety::AllowAll,
    };
    use async_trait::async_trait;
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    };

    /// Replays scripted results, then repeats the last one.
    struct Scripted {
        name: &'static str,
        platform: Option<Platform>,
        results: Mutex<Vec<Result<&'static str, ExtractError>>>,
        calls: AtomicU32,
        self_retrying: bool,
    }

    impl Scripted {
        fn new(name: &'static str, results: Vec<Result<&'static str, ExtractError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                platform: None,
                results: Mutex::new(results),
                calls: AtomicU32::new(0),
                self_retrying: false,
            })
        }

        fn for_platform(
            platform: Platform,
            results: Vec<Result<&'static str, ExtractError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name: platform.as_str(),
                platform: Some(platform),
                results: Mutex::new(results),
                calls: AtomicU32::new(0),
                self_retrying: false,
            })
        }

        fn self_retrying(name: &'static str, results: Vec<Result<&'static str, ExtractError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                platform: None,
                results: Mutex::new(results),
                calls: AtomicU32::new(0),
                self_retrying: true,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExtractionStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn can_handle(&self, _url: &str, platform: Platform) -> bool {
            self.platform.is_none_or(|p| p == platform)
        }

        fn retries_internally(&self) -> bool {
            self.self_retrying
        }

        async fn extract(
            &self,
            url: &str,
            platform: Platform,
            _options: &ExtractionOptions,
        ) -> Result<ExtractedContent, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut results = self.results.lock().unwrap();
                if results.len() > 1 { results.remove(0) } else { results[0].clone() }
            };
            next.map(|title| {
                ExtractedContent::new(
                    platform,
                    url,
                    ContentDraft {
                        title: Some(title.to_string()),
                        ..Default::default()
                    },
                )
            })
        }
    }

    fn builder() -> OrchestratorBuilder {
        ExtractionOrchestrator::builder()
            .gate(Arc::new(AllowAll))
            .retry(RetryPolicy::exponential(3, Duration::ZERO))
    }

    const XHS_URL: &str = "https://www.xiaohongshu.com/explore/64f1a2b3";
    const BLOG_URL: &str = "https://blog.example.com/post/1";

    #[tokio::test]
    async fn test_unknown_platform_failure_aggregates_generic_and_ai() {
        let generic = Scripted::new("generic", vec![Err(ExtractError::AuthWall("403 from origin".into()))]);
        let orchestrator = builder().generic_strategy(generic.clone()).build().unwrap();

        let err = orchestrator
            .extract(BLOG_URL, &ExtractionOptions::default())
            .await
            .unwrap_err();

        let attempts = err.failures();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].strategy, "generic");
        assert!(attempts[0].message.contains("403 from origin"));
        assert_eq!(attempts[1].strategy, "ai");
        assert_eq!(attempts[1].message, AI_UNAVAILABLE);
        assert_eq!(err.category(), ErrorCategory::AuthWall);
        assert_eq!(generic.calls(), 1);
    }

    #[tokio::test]
    async fn test_platform_success_skips_fallbacks() {
        let platform = Scripted::for_platform(Platform::Xiaohongshu, vec![Ok("探店笔记")]);
        let generic = Scripted::new("generic", vec![Ok("generic")]);
        let orchestrator = builder()
            .platform_strategy(platform.clone())
            .generic_strategy(generic.clone())
            .build()
            .unwrap();

        let content = orchestrator
            .extract(XHS_URL, &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(content.title(), "探店笔记");
        assert_eq!(content.platform(), Platform::Xiaohongshu);
        assert_eq!(generic.calls(), 0);
    }

    #[tokio::test]
    async fn test_platform_failure_falls_back_to_generic() {
        let platform = Scripted::for_platform(
            Platform::Xiaohongshu,
            vec![Err(ExtractError::AuthWall("login".into()))],
        );
        let generic = Scripted::new("generic", vec![Ok("generic title")]);
        let orchestrator = builder()
            .platform_strategy(platform.clone())
            .generic_strategy(generic)
            .build()
            .unwrap();

        let content = orchestrator
            .extract(XHS_URL, &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(content.title(), "generic title");
        assert_eq!(platform.calls(), 1, "auth walls are not retried");
    }

    #[tokio::test]
    async fn test_validation_failure_stops_the_chain() {
        let platform = Scripted::for_platform(
            Platform::Xiaohongshu,
            vec![Err(ExtractError::Validation("404 note not found".into()))],
        );
        let generic = Scripted::new("generic", vec![Ok("never")]);
        let orchestrator = builder()
            .platform_strategy(platform)
            .generic_strategy(generic.clone())
            .build()
            .unwrap();

        let err = orchestrator
            .extract(XHS_URL, &ExtractionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.failures().len(), 1);
        assert_eq!(generic.calls(), 0);
    }

    #[tokio::test]
    async fn test_ai_fallback_runs_after_generic() {
        let generic = Scripted::new("generic", vec![Err(ExtractError::Network("reset".into()))]);
        let ai = Scripted::new("ai", vec![Ok("from the model")]);
        let orchestrator = builder()
            .generic_strategy(generic.clone())
            .ai_strategy(ai.clone())
            .build()
            .unwrap();

        let content = orchestrator
            .extract(BLOG_URL, &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(content.title(), "from the model");
        assert_eq!(generic.calls(), 3, "network failures are retried");
        assert_eq!(ai.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_three_stages_reported() {
        let platform = Scripted::for_platform(
            Platform::Xiaohongshu,
            vec![Err(ExtractError::Rendering("browser crashed".into()))],
        );
        let generic = Scripted::new("generic", vec![Err(ExtractError::AuthWall("login".into()))]);
        let ai = Scripted::new("ai", vec![Err(ExtractError::Validation("schema".into()))]);
        let orchestrator = builder()
            .platform_strategy(platform)
            .generic_strategy(generic)
            .ai_strategy(ai)
            .build()
            .unwrap();

        let err = orchestrator
            .extract(XHS_URL, &ExtractionOptions::default())
            .await
            .unwrap_err();

        let names: Vec<String> = err.failures().into_iter().map(|f| f.strategy).collect();
        assert_eq!(names, vec!["xiaohongshu", "generic", "ai"]);
        assert!(err.user_message().contains("xiaohongshu、generic、ai"));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_in_place() {
        let generic = Scripted::new(
            "generic",
            vec![Err(ExtractError::Timeout("slow".into())), Ok("second try")],
        );
        let orchestrator = builder().generic_strategy(generic.clone()).build().unwrap();

        let content = orchestrator
            .extract(BLOG_URL, &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(content.title(), "second try");
        assert_eq!(generic.calls(), 2);
    }

    #[tokio::test]
    async fn test_self_retrying_strategy_runs_once_per_stage() {
        let generic = Scripted::self_retrying(
            "generic",
            vec![Err(ExtractError::Timeout("slow".into())), Ok("never reached")],
        );
        let orchestrator = builder().generic_strategy(generic.clone()).build().unwrap();

        let err = orchestrator
            .extract(BLOG_URL, &ExtractionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(generic.calls(), 1);
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn test_gate_rejection_makes_no_attempt() {
        let generic = Scripted::new("generic", vec![Ok("never")]);
        let orchestrator = ExtractionOrchestrator::builder()
            .generic_strategy(generic.clone())
            .build()
            .unwrap();

        let err = orchestrator
            .extract("http://127.0.0.1:8080/admin", &ExtractionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Rejected(_)));
        assert_eq!(generic.calls(), 0);

        let err = orchestrator
            .extract("not a url", &ExtractionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Validation(_)));
    }

    #[tokio::test]
    async fn test_preloaded_html_uses_real_platform_extractor() {
        let html = r#"<html><head>
            <meta property="og:title" content="周末去哪儿 - 小红书">
            <meta property="og:image" content="https://sns-webpic-qc.xhscdn.com/1.jpg">
            </head><body><div class="note-content">周末带着相机去了城郊的植物园，拍了很多花。</div></body></html>"#;
        let orchestrator = builder().build().unwrap();

        let content = orchestrator
            .extract(XHS_URL, &ExtractionOptions::with_preloaded_html(html))
            .await
            .unwrap();

        assert_eq!(content.platform(), Platform::Xiaohongshu);
        assert_eq!(content.title(), "周末去哪儿");
        assert_eq!(content.images().len(), 1);
    }

    fn ai_client(available: bool) -> MockAiClient {
        let mut client = MockAiClient::new();
        client.expect_is_available().return_const(available);
        client
            .expect_summarize()
            .returning(|_| Ok("模型摘要".to_string()));
        client
            .expect_optimize_title()
            .returning(|_, _| Ok("模型标题".to_string()));
        client.expect_categorize().returning(|_| {
            Ok(Categorization {
                content_type: "travel".into(),
                categories: vec!["旅行".into()],
                tags: vec!["植物园".into()],
            })
        });
        client
    }

    #[tokio::test]
    async fn test_smart_mode_routes_allow_listed_platform_through_ai_first() {
        let platform = Scripted::for_platform(Platform::Xiaohongshu, vec![Ok("plain")]);
        let ai_stage = Scripted::new("ai", vec![Ok("ai first")]);
        let ai = AiExtractor::new(Arc::new(ai_client(true))).with_retry(RetryPolicy::none());
        let orchestrator = builder()
            .platform_strategy(platform.clone())
            .ai_strategy(ai_stage.clone())
            .ai(ai)
            .build()
            .unwrap();

        let enhanced = orchestrator
            .smart_extract(XHS_URL, &ExtractionOptions::default(), &AiOptions::all())
            .await
            .unwrap();

        assert!(enhanced.enhanced);
        assert_eq!(enhanced.base().title(), "ai first");
        assert_eq!(enhanced.display_title(), "模型标题");
        assert_eq!(platform.calls(), 0);
    }

    #[tokio::test]
    async fn test_smart_mode_falls_back_to_regular_chain() {
        let platform = Scripted::for_platform(Platform::Xiaohongshu, vec![Ok("plain")]);
        let ai_stage = Scripted::new("ai", vec![Err(ExtractError::Validation("bad json".into()))]);
        let ai = AiExtractor::new(Arc::new(ai_client(true))).with_retry(RetryPolicy::none());
        let orchestrator = builder()
            .platform_strategy(platform.clone())
            .ai_strategy(ai_stage)
            .ai(ai)
            .build()
            .unwrap();

        let enhanced = orchestrator
            .smart_extract(XHS_URL, &ExtractionOptions::default(), &AiOptions::all())
            .await
            .unwrap();

        assert_eq!(enhanced.base().title(), "plain");
        assert_eq!(enhanced.summary.as_deref(), Some("模型摘要"));
        assert_eq!(platform.calls(), 1);
    }

    #[tokio::test]
    async fn test_smart_mode_ignores_platforms_off_the_list() {
        let ai_stage = Scripted::new("ai", vec![Ok("ai")]);
        let generic = Scripted::new("generic", vec![Ok("generic")]);
        let ai = AiExtractor::new(Arc::new(ai_client(false)));
        let orchestrator = builder()
            .generic_strategy(generic)
            .ai_strategy(ai_stage.clone())
            .ai(ai)
            .build()
            .unwrap();

        let result = orchestrator
            .smart_extract(BLOG_URL, &ExtractionOptions::default(), &AiOptions::all())
            .await
            .unwrap();

        assert!(!result.enhanced);
        assert_eq!(result.base().title(), "generic");
        assert_eq!(ai_stage.calls(), 0);
    }

    #[tokio::test]
    async fn test_ai_strategy_reads_preloaded_html() {
        let mut client = MockAiClient::new();
        client.expect_is_available().return_const(true);
        client.expect_extract_structured().returning(|_, _| {
            Ok(RawExtraction {
                title: Some("模型提取".into()),
                content: Some("正文".into()),
                images: vec![],
                author: None,
                published_at: None,
            })
        });
        let ai = AiExtractor::new(Arc::new(client)).with_retry(RetryPolicy::none());
        let generic = Scripted::new("generic", vec![Err(ExtractError::Unknown("boom".into()))]);
        let orchestrator = builder()
            .retry(RetryPolicy::none())
            .generic_strategy(generic)
            .ai(ai)
            .build()
            .unwrap();

        let content = orchestrator
            .extract(BLOG_URL, &ExtractionOptions::with_preloaded_html("<p>hello</p>"))
            .await
            .unwrap();

        assert_eq!(content.title(), "模型提取");
        assert!(orchestrator.ai_available());
    }
}
