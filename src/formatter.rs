use chrono::{DateTime, FixedOffset, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::LazyLock};
use url::Url;
use utoipa::ToSchema;

use crate::extractor::{AiEnhancedContent, images::has_image_signal};

/// The set `encodeURIComponent` leaves alone is `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static NON_IMAGE_RESOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(js|css|json|xml|txt|html|php|asp)$").expect("non-image resource regex")
});

const CHINA_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Flomo,
    Notes,
    Raw,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flomo" => Ok(Self::Flomo),
            "notes" => Ok(Self::Notes),
            "raw" => Ok(Self::Raw),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

impl OutputFormat {
    /// The app deep link for this format; `Raw` has none.
    pub fn deep_link(&self, content: &AiEnhancedContent) -> Option<String> {
        self.deep_link_at(content, Utc::now())
    }

    pub fn deep_link_at(&self, content: &AiEnhancedContent, now: DateTime<Utc>) -> Option<String> {
        match self {
            Self::Flomo => Some(to_flomo_url_at(content, now)),
            Self::Notes => Some(to_notes_url_at(content, now)),
            Self::Raw => None,
        }
    }
}

pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// http(s), not an obvious non-image resource, and some sign of imagery.
pub fn is_valid_image_url(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https")
        && !NON_IMAGE_RESOURCE.is_match(url.path())
        && has_image_signal(&url)
}

pub fn valid_images(images: &[String]) -> Vec<String> {
    images
        .iter()
        .filter(|img| is_valid_image_url(img))
        .cloned()
        .collect()
}

/// `2024/3/1 14:05:09` in China Standard Time.
fn timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(CHINA_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).format("%Y/%-m/%-d %H:%M:%S").to_string(),
        None => now.format("%Y/%-m/%-d %H:%M:%S").to_string(),
    }
}

fn enhanced_list(content: &AiEnhancedContent, list: &Option<Vec<String>>) -> Option<Vec<String>> {
    list.as_ref()
        .filter(|items| content.enhanced && !items.is_empty())
        .cloned()
}

pub fn flomo_text(content: &AiEnhancedContent, now: DateTime<Utc>) -> String {
    let base = content.base();
    let mut text = String::new();

    text.push_str(&format!("## {}\n\n", content.display_title()));
    text.push_str(&format!("{}\n\n", content.display_body()));

    if let Some(categories) = enhanced_list(content, &content.categories) {
        text.push_str(&format!("🏷️ {}\n", categories.join(" · ")));
    }
    if let Some(tags) = enhanced_list(content, &content.tags) {
        text.push_str(&format!("#{}\n\n", tags.join(" #")));
    }
    if let Some(author) = base.author() {
        text.push_str(&format!("👤 {author}\n"));
    }
    text.push_str(&format!("🔗 {}\n", base.source_url()));
    text.push_str(&format!("⏰ {}", timestamp(now)));
    if content.enhanced {
        text.push_str("\n✨ AI增强");
    }
    text
}

pub fn to_flomo_url(content: &AiEnhancedContent) -> String {
    to_flomo_url_at(content, Utc::now())
}

/// `flomo://create?content=…&image_urls=…`; images go as a JSON array, never comma-joined.
pub fn to_flomo_url_at(content: &AiEnhancedContent, now: DateTime<Utc>) -> String {
    let mut link = format!(
        "flomo://create?content={}",
        encode_component(&flomo_text(content, now))
    );

    let images = valid_images(content.base().images());
    if !images.is_empty()
        && let Ok(json) = serde_json::to_string(&images)
    {
        link.push_str(&format!("&image_urls={}", encode_component(&json)));
    }
    link
}

pub fn notes_text(content: &AiEnhancedContent, now: DateTime<Utc>) -> String {
    let base = content.base();
    let mut text = String::new();

    text.push_str(&format!("{}\n\n", content.display_title()));
    text.push_str(&format!("{}\n\n", content.display_body()));

    if let Some(categories) = enhanced_list(content, &content.categories) {
        text.push_str(&format!("分类: {}\n", categories.join(", ")));
    }
    if let Some(tags) = enhanced_list(content, &content.tags) {
        text.push_str(&format!("标签: {}\n\n", tags.join(", ")));
    }

    let images = valid_images(base.images());
    if !images.is_empty() {
        text.push_str("📷 图片链接：\n");
        for (index, image) in images.iter().enumerate() {
            text.push_str(&format!("{}. {image}\n", index + 1));
        }
        text.push('\n');
    }

    if let Some(author) = base.author() {
        text.push_str(&format!("作者: {author}\n"));
    }
    text.push_str(&format!("链接: {}\n", base.source_url()));
    text.push_str(&format!("时间: {}", timestamp(now)));
    if content.enhanced {
        text.push_str("\nAI增强内容");
    }
    text
}

pub fn to_notes_url(content: &AiEnhancedContent) -> String {
    to_notes_url_at(content, Utc::now())
}

/// `mobilenotes://create?note=…`; the app takes no images, so they are listed as links.
pub fn to_notes_url_at(content: &AiEnhancedContent, now: DateTime<Utc>) -> String {
    format!(
        "mobilenotes://create?note={}",
        encode_component(&notes_text(content, now))
    )
}
