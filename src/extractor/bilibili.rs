use regex::Regex;
use std::sync::LazyLock;

use crate::extractor::{
    PageExtractor,
    cleaner::{char_len, clean_text, strip_bracket_prefix, truncate_chars},
    dom::{Document, Rule, attr, attr_or_text, meta, text},
    fields::{ImageSource, OG_IMAGE, collect_images, first_author, first_date, image_source},
    images::ImageFilter,
    model::{ContentDraft, ExtractedContent, Platform},
    platform::host_matches,
};

pub const ORIGIN: &str = "https://www.bilibili.com";

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_HEADERS: &[(&str, &str)] = &[("User-Agent", DESKTOP_UA), ("Referer", "https://www.bilibili.com/")];

const TITLE_MIN_CHARS: usize = 5;
const DESC_MIN_CHARS: usize = 10;
const DESC_MAX_CHARS: usize = 300;
const AUTHOR_MAX_CHARS: usize = 50;

const TITLE_RULES: &[Rule] = &[
    meta(r#"meta[property="og:title"]"#),
    attr_or_text("h1[title]", "title"),
    text(".video-title"),
    meta(r#"meta[name="title"]"#),
    text(".m-video-info .title"),
    text("title"),
];

const DESC_RULES: &[Rule] = &[
    text(".video-desc .desc-info"),
    text(".video-info .desc"),
    meta(r#"meta[property="og:description"]"#),
    meta(r#"meta[name="description"]"#),
    text(".m-video-info .desc"),
    text(".bili-dyn-content__desc"),
    text(".desc-info-text"),
    text(".intro"),
];

const IMAGE_SOURCES: &[ImageSource] = &[
    OG_IMAGE,
    image_source(".video-cover img, .bili-video-card__cover img", &["src", "data-src"]),
    image_source(
        r#"img[src*="bfs.biliimg.com"], img[src*="hdslb.com"], img[src*="bilibili.com"]"#,
        &["src", "data-src"],
    ),
];

const AUTHOR_RULES: &[Rule] = &[
    text(".up-info .up-name"),
    text(".video-info .up-name"),
    text(".up-name"),
    text(".username"),
    text(".author-name"),
    text(".m-video-info .up-name"),
    text(".bili-dyn-author__name"),
    meta(r#"meta[name="author"]"#),
];

const DATE_RULES: &[Rule] = &[
    attr(".video-info .pubdate[data-ts]", "data-ts"),
    text(".video-info .pubdate"),
    text(".video-data .pubdate"),
    text(".pubdate-text"),
    text(".publish-time"),
    attr("time[datetime]", "datetime"),
    text(".m-video-info .time"),
    text(".bili-dyn-time"),
    meta(r#"meta[property="article:published_time"]"#),
    meta(r#"meta[itemprop="uploadDate"]"#),
];

static SITE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*_哔哩哔哩.*$|\s*-\s*bilibili.*$").expect("site suffix regex")
});

#[derive(Debug, Default, Clone, Copy)]
pub struct BilibiliExtractor;

impl BilibiliExtractor {
    pub fn new() -> Self {
        Self
    }

    fn filter(&self) -> ImageFilter {
        ImageFilter::image_like(ORIGIN).rejecting(&["face", "avatar"])
    }
}

fn clean_title(raw: &str) -> Option<String> {
    let title = strip_bracket_prefix(&SITE_SUFFIX.replace(&clean_text(raw), ""));
    (char_len(&title) > TITLE_MIN_CHARS).then_some(title)
}

fn clean_description(raw: &str) -> Option<String> {
    let desc = clean_text(raw);
    (char_len(&desc) > DESC_MIN_CHARS).then(|| truncate_chars(&desc, DESC_MAX_CHARS, "..."))
}

impl PageExtractor for BilibiliExtractor {
    fn platform(&self) -> Platform {
        Platform::Bilibili
    }

    fn can_handle(&self, url: &str) -> bool {
        host_matches(url, &["bilibili.com", "b23.tv"])
    }

    fn extract(&self, html: &str, source_url: &str) -> ExtractedContent {
        let doc = Document::parse(html);
        let mut images = Vec::new();
        collect_images(&doc, &self.filter(), IMAGE_SOURCES, &mut images);

        let draft = ContentDraft {
            title: doc.first_accepted(TITLE_RULES, None, clean_title),
            body: doc.first_accepted(DESC_RULES, None, clean_description),
            images,
            author: first_author(&doc, AUTHOR_RULES, AUTHOR_MAX_CHARS, |_| false),
            published_at: first_date(&doc, DATE_RULES),
        };

        ExtractedContent::new(Platform::Bilibili, source_url, draft)
    }

    fn image_filter(&self, _source_url: &str) -> ImageFilter {
        self.filter()
    }

    fn request_headers(&self) -> &'static [(&'static str, &'static str)] {
        REQUEST_HEADERS
    }

    fn resolves_short_link(&self, url: &str) -> bool {
        host_matches(url, &["b23.tv"])
    }
}
