use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    browser::{
        BrowserDriver, BrowserSession, BrowserTab, Navigation,
        profiles::{DeviceProfile, NAVIGATION_TIMEOUT, SETTLE_TIMEOUT, default_profiles},
    },
    errors::ExtractError,
    extractor::{ExtractedContent, ExtractionOptions, PageExtractor},
};

/// Renders pages in a headless browser, rotating device profiles until one
/// is not bounced to a login page.
///
/// Every render runs in its own browser session, and the session plus every
/// tab opened in it are closed before `render` returns, on success and failure.
pub struct HeadlessBrowserExtractor {
    driver: Arc<dyn BrowserDriver>,
    profiles: Vec<DeviceProfile>,
    navigation_timeout: Duration,
    settle_timeout: Duration,
    closed: AtomicBool,
}

impl HeadlessBrowserExtractor {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            profiles: default_profiles(),
            navigation_timeout: NAVIGATION_TIMEOUT,
            settle_timeout: SETTLE_TIMEOUT,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<DeviceProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_timeouts(mut self, navigation: Duration, settle: Duration) -> Self {
        self.navigation_timeout = navigation;
        self.settle_timeout = settle;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting renders. Safe to call any number of times.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Headless browser extractor closed");
        }
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn render(&self, url: &str) -> Result<String, ExtractError> {
        if self.is_closed() {
            return Err(ExtractError::Unavailable(
                "headless browser extractor is closed".into(),
            ));
        }

        let mut session = self.driver.launch().await?;
        let result = self.render_in(session.as_mut(), url).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close browser session");
        }

        result
    }

    pub async fn extract(
        &self,
        url: &str,
        options: &ExtractionOptions,
        page: &dyn PageExtractor,
    ) -> Result<ExtractedContent, ExtractError> {
        if let Some(html) = options.preloaded() {
            return Ok(page.extract(html, url));
        }
        let html = self.render(url).await?;
        Ok(page.extract(&html, url))
    }

    async fn render_in(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> Result<String, ExtractError> {
        let mut login_page: Option<Box<dyn BrowserTab>> = None;
        let mut last_error = None;

        for profile in &self.profiles {
            let mut tab = match session.open_tab(profile).await {
                Ok(tab) => tab,
                Err(e) => {
                    warn!(profile = profile.name, error = %e, "Failed to open tab");
                    last_error = Some(e);
                    continue;
                }
            };

            match self.navigate(tab.as_mut(), url).await {
                Ok(nav) if !nav.is_login_redirect() => {
                    debug!(profile = profile.name, final_url = %nav.final_url, "Navigation succeeded");
                    if let Some(mut stale) = login_page.take() {
                        close_tab(stale.as_mut()).await;
                    }
                    return self.read(tab).await;
                }
                Ok(nav) => {
                    warn!(profile = profile.name, final_url = %nav.final_url, "Redirected to login");
                    last_error = Some(ExtractError::AuthWall(format!(
                        "{} was redirected to {}",
                        profile.name, nav.final_url
                    )));
                    if let Some(mut stale) = login_page.replace(tab) {
                        close_tab(stale.as_mut()).await;
                    }
                }
                Err(e) => {
                    warn!(profile = profile.name, error = %e, "Navigation failed");
                    close_tab(tab.as_mut()).await;
                    last_error = Some(e);
                }
            }
        }

        // Every profile hit the login wall; parse whatever that page shows.
        if let Some(tab) = login_page {
            return self.read(tab).await;
        }

        Err(last_error
            .unwrap_or_else(|| ExtractError::Rendering("no device profiles configured".into())))
    }

    async fn navigate(&self, tab: &mut dyn BrowserTab, url: &str) -> Result<Navigation, ExtractError> {
        match tokio::time::timeout(self.navigation_timeout, tab.navigate(url, self.navigation_timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout(format!(
                "navigation exceeded {}ms",
                self.navigation_timeout.as_millis()
            ))),
        }
    }

    async fn read(&self, mut tab: Box<dyn BrowserTab>) -> Result<String, ExtractError> {
        tab.settle(self.settle_timeout).await;
        let html = match tokio::time::timeout(self.settle_timeout, tab.content()).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout("reading page content timed out".into())),
        };
        close_tab(tab.as_mut()).await;
        html
    }
}

async fn close_tab(tab: &mut dyn BrowserTab) {
    if let Err(e) = tab.close().await {
        warn!(error = %e, "Failed to close tab");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::xiaohongshu::{LOGIN_MESSAGE, XiaohongshuExtractor};
    use async_trait::async_trait;
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicI32, AtomicU32},
        },
    };

    #[derive(Clone)]
    enum Step {
        Land(&'static str, &'static str),
        Fail,
        Hang,
    }

    #[derive(Default)]
    struct Counters {
        sessions_open: AtomicI32,
        tabs_open: AtomicI32,
        tabs_opened: AtomicU32,
        profiles_used: Mutex<Vec<&'static str>>,
    }

    struct ScriptedDriver {
        steps: Vec<Step>,
        counters: Arc<Counters>,
    }

    struct ScriptedSession {
        steps: VecDeque<Step>,
        counters: Arc<Counters>,
        closed: bool,
    }

    struct ScriptedTab {
        step: Step,
        counters: Arc<Counters>,
        closed: bool,
    }

    #[async_trait]
    impl BrowserDriver for ScriptedDriver {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, ExtractError> {
            self.counters.sessions_open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                steps: self.steps.clone().into(),
                counters: self.counters.clone(),
                closed: false,
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn open_tab(
            &mut self,
            profile: &DeviceProfile,
        ) -> Result<Box<dyn BrowserTab>, ExtractError> {
            let step = self.steps.pop_front().unwrap_or(Step::Fail);
            self.counters.tabs_open.fetch_add(1, Ordering::SeqCst);
            self.counters.tabs_opened.fetch_add(1, Ordering::SeqCst);
            self.counters.profiles_used.lock().unwrap().push(profile.name);
            Ok(Box::new(ScriptedTab {
                step,
                counters: self.counters.clone(),
                closed: false,
            }))
        }

        async fn close(&mut self) -> Result<(), ExtractError> {
            if !self.closed {
                self.closed = true;
                self.counters.sessions_open.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserTab for ScriptedTab {
        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<Navigation, ExtractError> {
            match &self.step {
                Step::Land(final_url, _) => Ok(Navigation {
                    final_url: final_url.to_string(),
                }),
                Step::Fail => Err(ExtractError::Rendering("net::ERR_ABORTED".into())),
                Step::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn settle(&mut self, _timeout: Duration) {}

        async fn content(&mut self) -> Result<String, ExtractError> {
            match &self.step {
                Step::Land(_, html) => Ok(html.to_string()),
                _ => Err(ExtractError::Rendering("no document".into())),
            }
        }

        async fn close(&mut self) -> Result<(), ExtractError> {
            if !self.closed {
                self.closed = true;
                self.counters.tabs_open.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn extractor(steps: Vec<Step>) -> (HeadlessBrowserExtractor, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let driver = ScriptedDriver {
            steps,
            counters: counters.clone(),
        };
        let extractor = HeadlessBrowserExtractor::new(Arc::new(driver))
            .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));
        (extractor, counters)
    }

    fn assert_all_released(counters: &Counters) {
        assert_eq!(counters.sessions_open.load(Ordering::SeqCst), 0);
        assert_eq!(counters.tabs_open.load(Ordering::SeqCst), 0);
    }

    const NOTE: &str = "<html><body><div id=\"detail-desc\">这是一篇关于周末露营装备清单的详细笔记分享内容</div></body></html>";
    const LOGIN: &str = "<html><body><div>登录后推荐更懂你的笔记</div></body></html>";

    #[tokio::test]
    async fn test_login_redirect_then_success_uses_second_profile() {
        let (headless, counters) = extractor(vec![
            Step::Land("https://www.xiaohongshu.com/login?redirect=1", LOGIN),
            Step::Land("https://www.xiaohongshu.com/explore/1", NOTE),
        ]);

        let html = headless.render("https://www.xiaohongshu.com/explore/1").await.unwrap();

        assert_eq!(html, NOTE);
        assert_eq!(counters.tabs_opened.load(Ordering::SeqCst), 2);
        assert_eq!(
            *counters.profiles_used.lock().unwrap(),
            vec!["iphone_safari", "android_chrome"]
        );
        assert_all_released(&counters);
    }

    #[tokio::test]
    async fn test_every_profile_at_login_wall_parses_login_page() {
        let (headless, counters) = extractor(vec![
            Step::Land("https://www.xiaohongshu.com/login", LOGIN),
            Step::Land("https://www.xiaohongshu.com/login", LOGIN),
            Step::Land("https://www.xiaohongshu.com/login", LOGIN),
        ]);

        let content = headless
            .extract(
                "https://www.xiaohongshu.com/explore/1",
                &ExtractionOptions::default(),
                &XiaohongshuExtractor::new(),
            )
            .await
            .unwrap();

        assert_eq!(content.body(), LOGIN_MESSAGE);
        assert_eq!(counters.tabs_opened.load(Ordering::SeqCst), 3);
        assert_all_released(&counters);
    }

    #[tokio::test]
    async fn test_all_navigations_failing_releases_everything() {
        let (headless, counters) = extractor(vec![Step::Fail, Step::Fail, Step::Fail]);

        let err = headless.render("https://www.xiaohongshu.com/explore/1").await.unwrap_err();

        assert!(matches!(err, ExtractError::Rendering(_)));
        assert_all_released(&counters);
    }

    #[tokio::test]
    async fn test_hanging_navigation_times_out() {
        let (headless, counters) = extractor(vec![Step::Hang, Step::Hang, Step::Hang]);

        let err = headless.render("https://www.xiaohongshu.com/explore/1").await.unwrap_err();

        assert!(matches!(err, ExtractError::Timeout(_)));
        assert_all_released(&counters);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_renders() {
        let (headless, counters) = extractor(vec![Step::Land("https://x.test/", NOTE)]);

        headless.close();
        headless.close();

        let err = headless.render("https://x.test/").await.unwrap_err();
        assert!(matches!(err, ExtractError::Unavailable(_)));
        assert_eq!(counters.tabs_opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preloaded_html_skips_browser() {
        let (headless, counters) = extractor(vec![]);

        let content = headless
            .extract(
                "https://www.xiaohongshu.com/explore/1",
                &ExtractionOptions::with_preloaded_html(NOTE),
                &XiaohongshuExtractor::new(),
            )
            .await
            .unwrap();

        assert!(content.body().contains("露营装备"));
        assert_eq!(counters.tabs_opened.load(Ordering::SeqCst), 0);
    }
}
