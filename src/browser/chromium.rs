use async_trait::async_trait;
use chromiumoxide::{
    Page,
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::{
        emulation::SetDeviceMetricsOverrideParams,
        network::{Headers, SetExtraHttpHeadersParams},
        page::AddScriptToEvaluateOnNewDocumentParams,
    },
};
use futures::StreamExt;
use std::{path::PathBuf, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    browser::{
        BrowserDriver, BrowserSession, BrowserTab, Navigation,
        profiles::{DeviceProfile, LAUNCH_ARGS, STEALTH_SCRIPT},
    },
    errors::ExtractError,
};

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

fn rendering(context: &str, err: impl std::fmt::Display) -> ExtractError {
    ExtractError::Rendering(format!("{context}: {err}"))
}

/// Launches a local headless Chromium per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumDriver {
    executable: Option<PathBuf>,
}

impl ChromiumDriver {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ExtractError> {
        let mut builder = BrowserConfig::builder().args(LAUNCH_ARGS.iter().copied());
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|e| rendering("browser config", e))?;

        let (browser, mut handler) = tokio::time::timeout(LAUNCH_TIMEOUT, Browser::launch(config))
            .await
            .map_err(|_| ExtractError::Timeout("browser launch timed out".into()))?
            .map_err(|e| rendering("browser launch", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!("Launched headless Chromium");
        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            handler_task: Some(handler_task),
        }))
    }
}

struct ChromiumSession {
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn open_tab(&mut self, profile: &DeviceProfile) -> Result<Box<dyn BrowserTab>, ExtractError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ExtractError::Rendering("browser session already closed".into()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| rendering("open tab", e))?;

        if let Err(e) = apply_profile(&page, profile).await {
            let _ = page.close().await;
            return Err(e);
        }

        Ok(Box::new(ChromiumTab { page: Some(page) }))
    }

    async fn close(&mut self) -> Result<(), ExtractError> {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Browser close command failed");
            }
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "Waiting for browser exit failed");
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        Ok(())
    }
}

async fn apply_profile(page: &Page, profile: &DeviceProfile) -> Result<(), ExtractError> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
        .await
        .map_err(|e| rendering("inject stealth script", e))?;

    page.set_user_agent(profile.user_agent)
        .await
        .map_err(|e| rendering("set user agent", e))?;

    let (width, height) = profile.viewport;
    page.execute(SetDeviceMetricsOverrideParams::new(
        i64::from(width),
        i64::from(height),
        profile.device_scale_factor,
        profile.mobile,
    ))
    .await
    .map_err(|e| rendering("set device metrics", e))?;

    let headers: serde_json::Map<String, serde_json::Value> = profile
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), serde_json::Value::from(*value)))
        .collect();
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(serde_json::Value::Object(headers))))
        .await
        .map_err(|e| rendering("set extra headers", e))?;

    Ok(())
}

struct ChromiumTab {
    page: Option<Page>,
}

impl ChromiumTab {
    fn page(&self) -> Result<&Page, ExtractError> {
        self.page
            .as_ref()
            .ok_or_else(|| ExtractError::Rendering("tab already closed".into()))
    }
}

#[async_trait]
impl BrowserTab for ChromiumTab {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Navigation, ExtractError> {
        let page = self.page()?;
        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| ExtractError::Timeout(format!("navigation exceeded {}ms", timeout.as_millis())))?
            .map_err(|e| rendering("navigate", e))?;

        let final_url = page
            .url()
            .await
            .map_err(|e| rendering("read url", e))?
            .unwrap_or_else(|| url.to_string());

        Ok(Navigation { final_url })
    }

    async fn settle(&mut self, timeout: Duration) {
        let Ok(page) = self.page() else {
            return;
        };
        if tokio::time::timeout(timeout, page.wait_for_navigation()).await.is_err() {
            debug!("Page did not reach load state before settle timeout");
        }
        // nudge lazy-loaded images
        let _ = page
            .evaluate("window.scrollTo(0, document.body ? document.body.scrollHeight / 2 : 0)")
            .await;
        tokio::time::sleep(Duration::from_millis(500).min(timeout)).await;
    }

    async fn content(&mut self) -> Result<String, ExtractError> {
        self.page()?
            .content()
            .await
            .map_err(|e| rendering("read content", e))
    }

    async fn close(&mut self) -> Result<(), ExtractError> {
        if let Some(page) = self.page.take() {
            page.close().await.map_err(|e| rendering("close tab", e))?;
        }
        Ok(())
    }
}
