//! Rendered-page loading through a headless browser.
//!
//! The browser itself sits behind [`BrowserDriver`], [`BrowserSession`] and
//! [`BrowserTab`] so the profile rotation in [`headless`] can be driven by a
//! real Chromium or by a scripted fake.

#[cfg(feature = "headless")]
pub mod chromium;
pub mod headless;
pub mod profiles;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::ExtractError;

pub use headless::HeadlessBrowserExtractor;
pub use profiles::DeviceProfile;

/// Where a navigation ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub final_url: String,
}

impl Navigation {
    pub fn is_login_redirect(&self) -> bool {
        self.final_url.to_ascii_lowercase().contains("/login")
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Starts an isolated browser context for one extraction.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ExtractError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn open_tab(&mut self, profile: &DeviceProfile) -> Result<Box<dyn BrowserTab>, ExtractError>;

    /// Releases the context. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), ExtractError>;
}

#[async_trait]
pub trait BrowserTab: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Navigation, ExtractError>;

    /// Best-effort wait for client-side content; never fails.
    async fn settle(&mut self, timeout: Duration);

    async fn content(&mut self) -> Result<String, ExtractError>;

    /// Closes the tab. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), ExtractError>;
}
