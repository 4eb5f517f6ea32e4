use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::extractor::{
    PageExtractor,
    cleaner::{char_len, clean_text, strip_bracket_prefix, truncate_chars},
    dates::{find_date, parse_date},
    dom::{Document, Rule, exclusion, meta, text},
    fields::{ImageSource, OG_IMAGE, collect_images, first_author, image_source},
    images::ImageFilter,
    model::{ContentDraft, ExtractedContent, Platform},
    platform::host_matches,
};

pub const ORIGIN: &str = "https://mp.weixin.qq.com";

const WECHAT_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148 MicroMessenger/8.0.42(0x18002a2d) NetType/WIFI Language/zh_CN";

const REQUEST_HEADERS: &[(&str, &str)] = &[("User-Agent", WECHAT_UA)];

const TITLE_MIN_CHARS: usize = 5;
const BODY_MIN_CHARS: usize = 50;
const BODY_MAX_CHARS: usize = 2000;
const AUTHOR_MAX_CHARS: usize = 100;

const TITLE_RULES: &[Rule] = &[
    meta(r#"meta[property="og:title"]"#),
    meta(r#"meta[property="twitter:title"], meta[name="twitter:title"]"#),
    text("#activity-name"),
    text(".rich_media_title"),
    text("h1.rich_media_title"),
    text("title"),
];

const BOILERPLATE: &[&str] = &[
    "script",
    "style",
    ".rich_media_tool",
    ".qr_code_pc_outer",
    ".reward_qrcode_area",
];

const BODY_RULES: &[Rule] = &[
    text("#js_content"),
    text(".rich_media_content"),
    text(".rich_media_area_primary"),
    text(".main-content"),
    text(".article-content"),
];

const IMAGE_SOURCES: &[ImageSource] = &[
    OG_IMAGE,
    image_source(
        "#js_content img, .rich_media_content img",
        &["data-src", "src", "data-w-src"],
    ),
];

const AUTHOR_RULES: &[Rule] = &[
    text("#js_name"),
    text(".rich_media_meta_nickname"),
    text(".account_nickname"),
    text(".rich_media_meta .rich_media_meta_text"),
    meta(r#"meta[name="author"]"#),
];

const DATE_SELECTORS: &[&str] = &["#publish_time", ".rich_media_meta_text", ".time"];

static FOLLOW_PROMPTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)长按二维码关注.*$|扫描二维码关注.*$|点击上方.*?关注我们|关注我们获取更多.*$")
        .expect("follow prompt regex")
});

static INLINE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"var\s+ct\s*=\s*"(\d{10})""#).expect("inline timestamp regex")
});

#[derive(Debug, Default, Clone, Copy)]
pub struct WechatExtractor;

impl WechatExtractor {
    pub fn new() -> Self {
        Self
    }

    fn filter(&self) -> ImageFilter {
        ImageFilter::image_like(ORIGIN).rejecting(&["qr_code", "qrcode"])
    }

    fn body(&self, doc: &Document) -> Option<String> {
        let excluded = exclusion(BOILERPLATE);
        doc.first_accepted(BODY_RULES, excluded.as_ref(), |raw| {
            let without_prompts = FOLLOW_PROMPTS.replace_all(raw, "");
            let body = clean_text(&without_prompts);
            (char_len(&body) > BODY_MIN_CHARS).then(|| truncate_chars(&body, BODY_MAX_CHARS, "..."))
        })
    }

    fn published_at(&self, doc: &Document) -> Option<DateTime<Utc>> {
        DATE_SELECTORS
            .iter()
            .filter_map(|css| doc.first(css))
            .find_map(|el| find_date(&el.text().collect::<String>()))
            .or_else(|| {
                doc.meta_contents(r#"meta[property="article:published_time"]"#)
                    .first()
                    .and_then(|raw| parse_date(raw))
            })
            .or_else(|| {
                let scripts = doc.script_text();
                let caps = INLINE_TIMESTAMP.captures(&scripts)?;
                parse_date(caps.get(1)?.as_str())
            })
    }
}

fn clean_title(raw: &str) -> Option<String> {
    let title = clean_text(raw);
    if char_len(&title) <= TITLE_MIN_CHARS {
        return None;
    }
    Some(strip_bracket_prefix(&title))
}

impl PageExtractor for WechatExtractor {
    fn platform(&self) -> Platform {
        Platform::Wechat
    }

    fn can_handle(&self, url: &str) -> bool {
        host_matches(url, &["mp.weixin.qq.com"])
    }

    fn extract(&self, html: &str, source_url: &str) -> ExtractedContent {
        let doc = Document::parse(html);
        let mut images = Vec::new();
        collect_images(&doc, &self.filter(), IMAGE_SOURCES, &mut images);

        let draft = ContentDraft {
            title: doc.first_accepted(TITLE_RULES, None, clean_title),
            body: self.body(&doc),
            images,
            author: first_author(&doc, AUTHOR_RULES, AUTHOR_MAX_CHARS, |_| false),
            published_at: self.published_at(&doc),
        };

        ExtractedContent::new(Platform::Wechat, source_url, draft)
    }

    fn image_filter(&self, _source_url: &str) -> ImageFilter {
        self.filter()
    }

    fn request_headers(&self) -> &'static [(&'static str, &'static str)] {
        REQUEST_HEADERS
    }
}
