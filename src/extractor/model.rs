use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr, time::Duration};
use utoipa::ToSchema;

use crate::extractor::images::{ImageFilter, MAX_IMAGES};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Xiaohongshu,
    Bilibili,
    Wechat,
    Unknown,
}

impl Platform {
    pub const SUPPORTED: [Platform; 3] = [Self::Xiaohongshu, Self::Bilibili, Self::Wechat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xiaohongshu => "xiaohongshu",
            Self::Bilibili => "bilibili",
            Self::Wechat => "wechat",
            Self::Unknown => "unknown",
        }
    }

    /// Title used when nothing on the page yields one.
    pub fn placeholder_title(&self) -> &'static str {
        match self {
            Self::Xiaohongshu => "小红书笔记",
            Self::Bilibili => "B站视频",
            Self::Wechat => "微信公众号文章",
            Self::Unknown => "未知标题",
        }
    }

    /// Body used when nothing on the page yields one.
    pub fn placeholder_body(&self) -> &'static str {
        match self {
            Self::Xiaohongshu => "无法提取小红书内容，可能需要登录或页面结构已变化",
            Self::Bilibili => "暂无简介",
            Self::Wechat => "无法提取文章内容",
            Self::Unknown => "无法提取内容",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xiaohongshu" | "xhs" => Ok(Self::Xiaohongshu),
            "bilibili" => Ok(Self::Bilibili),
            "wechat" | "weixin" => Ok(Self::Wechat),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Raw field values gathered by an extractor before normalization.
#[derive(Debug, Default, Clone)]
pub struct ContentDraft {
    pub title: Option<String>,
    pub body: Option<String>,
    pub images: Vec<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// The normalized result of one extraction.
///
/// Fields are private so that the title/body placeholders, the image cap and
/// the platform tag are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    title: String,
    body: String,
    images: Vec<String>,
    author: Option<String>,
    published_at: Option<DateTime<Utc>>,
    platform: Platform,
    source_url: String,
}

impl ExtractedContent {
    pub fn new(platform: Platform, source_url: impl Into<String>, draft: ContentDraft) -> Self {
        let title = non_empty(draft.title).unwrap_or_else(|| platform.placeholder_title().into());
        let body = non_empty(draft.body).unwrap_or_else(|| platform.placeholder_body().into());

        Self {
            title,
            body,
            images: ImageFilter::dedupe_and_cap(draft.images, MAX_IMAGES),
            author: non_empty(draft.author),
            published_at: draft.published_at,
            platform,
            source_url: source_url.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Article,
    Video,
    Image,
    Tutorial,
    Review,
    News,
    Recipe,
    Travel,
    Lifestyle,
    Technology,
    Entertainment,
    Other,
}

impl ContentType {
    /// Maps a model-provided label onto the closed set; anything unrecognized is `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "article" => Self::Article,
            "video" => Self::Video,
            "image" => Self::Image,
            "tutorial" => Self::Tutorial,
            "review" => Self::Review,
            "news" => Self::News,
            "recipe" => Self::Recipe,
            "travel" => Self::Travel,
            "lifestyle" => Self::Lifestyle,
            "technology" => Self::Technology,
            "entertainment" => Self::Entertainment,
            _ => Self::Other,
        }
    }
}

pub const MAX_CATEGORIES: usize = 2;
pub const MAX_TAGS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiEnhancedContent {
    #[serde(flatten)]
    base: ExtractedContent,
    pub summary: Option<String>,
    pub optimized_title: Option<String>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub content_type: Option<ContentType>,
    pub enhanced: bool,
}

impl AiEnhancedContent {
    pub fn unenhanced(base: ExtractedContent) -> Self {
        Self {
            base,
            summary: None,
            optimized_title: None,
            categories: None,
            tags: None,
            content_type: None,
            enhanced: false,
        }
    }

    pub fn enhanced(base: ExtractedContent) -> Self {
        Self {
            enhanced: true,
            ..Self::unenhanced(base)
        }
    }

    pub fn base(&self) -> &ExtractedContent {
        &self.base
    }

    pub fn into_base(self) -> ExtractedContent {
        self.base
    }

    /// Keeps the enhancement fields and swaps in freshly extracted content.
    pub fn with_base(self, base: ExtractedContent) -> Self {
        Self { base, ..self }
    }

    pub fn set_categorization(
        &mut self,
        content_type: ContentType,
        categories: Vec<String>,
        tags: Vec<String>,
    ) {
        self.content_type = Some(content_type);
        self.categories = Some(categories.into_iter().take(MAX_CATEGORIES).collect());
        self.tags = Some(tags.into_iter().take(MAX_TAGS).collect());
    }

    /// The optimized title when enhancement produced one, else the extracted title.
    pub fn display_title(&self) -> &str {
        match (&self.optimized_title, self.enhanced) {
            (Some(title), true) if !title.trim().is_empty() => title,
            _ => self.base.title(),
        }
    }

    /// The summary when enhancement produced one, else the extracted body.
    pub fn display_body(&self) -> &str {
        match (&self.summary, self.enhanced) {
            (Some(summary), true) if !summary.trim().is_empty() => summary,
            _ => self.base.body(),
        }
    }
}

impl From<ExtractedContent> for AiEnhancedContent {
    fn from(base: ExtractedContent) -> Self {
        Self::unenhanced(base)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionOptions {
    #[serde(alias = "timeout", alias = "timeout_ms")]
    pub timeout_ms: Option<u64>,
    pub headers: HashMap<String, String>,
    /// HTML fetched by the caller; when present no network request is made.
    #[serde(alias = "preloaded_html")]
    pub preloaded_html: Option<String>,
    #[serde(alias = "usePlaywright", alias = "force_headless_browser")]
    pub force_headless_browser: bool,
}

impl ExtractionOptions {
    pub fn with_preloaded_html(html: impl Into<String>) -> Self {
        Self {
            preloaded_html: Some(html.into()),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn preloaded(&self) -> Option<&str> {
        self.preloaded_html
            .as_deref()
            .filter(|html| !html.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_fill_missing_fields() {
        let content = ExtractedContent::new(
            Platform::Bilibili,
            "https://www.bilibili.com/video/BV1",
            ContentDraft {
                title: Some("   ".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(content.title(), "B站视频");
        assert_eq!(content.body(), "暂无简介");
        assert!(content.author().is_none());
    }

    #[test]
    fn test_images_deduplicated_and_capped() {
        let images = (0..12)
            .map(|i| format!("https://img.example.com/{}.jpg", i % 10))
            .collect();
        let content = ExtractedContent::new(
            Platform::Unknown,
            "https://example.com",
            ContentDraft {
                images,
                ..Default::default()
            },
        );

        assert_eq!(content.images().len(), MAX_IMAGES);
        assert_eq!(content.images()[0], "https://img.example.com/0.jpg");
    }

    #[test]
    fn test_categorization_is_capped() {
        let base = ExtractedContent::new(Platform::Unknown, "https://example.com", ContentDraft::default());
        let mut enhanced = AiEnhancedContent::enhanced(base);
        enhanced.set_categorization(
            ContentType::from_label("Recipe"),
            vec!["a".into(), "b".into(), "c".into()],
            (0..8).map(|i| i.to_string()).collect(),
        );

        assert_eq!(enhanced.content_type, Some(ContentType::Recipe));
        assert_eq!(enhanced.categories.as_ref().map(Vec::len), Some(2));
        assert_eq!(enhanced.tags.as_ref().map(Vec::len), Some(5));
    }

    #[test]
    fn test_unknown_content_type_maps_to_other() {
        assert_eq!(ContentType::from_label("podcast"), ContentType::Other);
    }

    #[test]
    fn test_display_fields_prefer_ai_output_only_when_enhanced() {
        let base = ExtractedContent::new(
            Platform::Wechat,
            "https://mp.weixin.qq.com/s/abc",
            ContentDraft {
                title: Some("原始标题很长很长".into()),
                body: Some("原文".into()),
                ..Default::default()
            },
        );

        let mut plain = AiEnhancedContent::unenhanced(base.clone());
        plain.summary = Some("摘要".into());
        assert_eq!(plain.display_body(), "原文");

        let mut enhanced = AiEnhancedContent::enhanced(base);
        enhanced.summary = Some("摘要".into());
        assert_eq!(enhanced.display_body(), "摘要");
        assert_eq!(enhanced.display_title(), "原始标题很长很长");
    }

    #[test]
    fn test_options_accept_legacy_field_names() {
        let options: ExtractionOptions = serde_json::from_value(serde_json::json!({
            "timeout": 5000,
            "preloadedHtml": "<html></html>",
            "usePlaywright": true
        }))
        .unwrap();

        assert_eq!(options.timeout(), Duration::from_millis(5000));
        assert_eq!(options.preloaded(), Some("<html></html>"));
        assert!(options.force_headless_browser);
    }
}
