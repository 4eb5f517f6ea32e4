pub mod bilibili;
pub mod cleaner;
pub mod dates;
pub mod dom;
pub mod fields;
pub mod generic;
pub mod images;
pub mod model;
pub mod platform;
pub mod wechat;
pub mod xiaohongshu;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use generic::GenericExtractor;
pub use images::ImageFilter;
pub use model::{
    AiEnhancedContent, ContentDraft, ContentType, ExtractedContent, ExtractionOptions, Platform,
};
pub use platform::{detect_platform, is_supported, supported_platforms};

/// How a platform's pages are best obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Plain HTTP first, rendered browser only when that fails.
    FetchFirst,
    /// Rendered browser first; the page is a client-side app.
    HeadlessFirst,
}

/// Turns one platform's HTML into [`ExtractedContent`].
///
/// Implementations are pure: the same HTML and URL always produce the same
/// content, and no network access happens here.
pub trait PageExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    fn can_handle(&self, url: &str) -> bool;

    fn extract(&self, html: &str, source_url: &str) -> ExtractedContent;

    /// The predicate every image in the output has passed.
    fn image_filter(&self, source_url: &str) -> ImageFilter;

    fn load_strategy(&self) -> LoadStrategy {
        LoadStrategy::FetchFirst
    }

    /// Headers this platform needs on the outgoing request.
    fn request_headers(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Whether `url` is a short link that must be followed before loading.
    fn resolves_short_link(&self, _url: &str) -> bool {
        false
    }
}

pub fn platform_extractor(platform: Platform) -> Option<Arc<dyn PageExtractor>> {
    match platform {
        Platform::Xiaohongshu => Some(Arc::new(xiaohongshu::XiaohongshuExtractor::new())),
        Platform::Bilibili => Some(Arc::new(bilibili::BilibiliExtractor::new())),
        Platform::Wechat => Some(Arc::new(wechat::WechatExtractor::new())),
        Platform::Unknown => None,
    }
}
