use url::Url;

use crate::extractor::{
    PageExtractor, platform_extractor,
    cleaner::{char_len, clean_text, truncate_chars},
    dom::{Document, Rule, attr, exclusion, meta, text},
    fields::{ImageSource, OG_IMAGE, TWITTER_IMAGE, collect_images, first_author, first_date, image_source},
    images::ImageFilter,
    model::{ContentDraft, ExtractedContent, Platform},
};

const BODY_MIN_CHARS: usize = 50;
const PAGE_TEXT_MIN_CHARS: usize = 100;
const BODY_MAX_CHARS: usize = 2000;
const AUTHOR_MAX_CHARS: usize = 100;

const TITLE_RULES: &[Rule] = &[
    meta(r#"meta[property="og:title"]"#),
    meta(r#"meta[name="twitter:title"], meta[property="twitter:title"]"#),
    text("title"),
    text("h1"),
    text(".title"),
    text(".post-title"),
    text(".article-title"),
];

const BOILERPLATE: &[&str] = &[
    "script",
    "style",
    "noscript",
    "nav",
    "header",
    "footer",
    "aside",
    ".sidebar",
    ".ads",
    ".advertisement",
];

const BODY_RULES: &[Rule] = &[
    text(".content"),
    text(".post-content"),
    text(".article-content"),
    text(".entry-content"),
    text(".main-content"),
    text("article"),
    text(".post-body"),
    text(".text-content"),
    text(".note-text"),
    text("main"),
    text(r#"[role="main"]"#),
];

const IMAGE_SOURCES: &[ImageSource] = &[
    OG_IMAGE,
    TWITTER_IMAGE,
    image_source("img", &["src", "data-src", "data-original"]),
];

const AUTHOR_RULES: &[Rule] = &[
    meta(r#"meta[name="author"]"#),
    meta(r#"meta[property="article:author"]"#),
    text(".author"),
    text(".byline"),
    text(".post-author"),
    text(".author-name"),
];

const DATE_RULES: &[Rule] = &[
    meta(r#"meta[property="article:published_time"]"#),
    meta(r#"meta[name="publish_date"], meta[name="pubdate"]"#),
    attr("time[datetime]", "datetime"),
    text(".publish-date"),
    text(".post-date"),
    text(".date"),
];

/// Site-agnostic extractor; tags its output with whatever platform it was built for.
#[derive(Debug, Clone, Copy)]
pub struct GenericExtractor {
    platform: Platform,
}

impl Default for GenericExtractor {
    fn default() -> Self {
        Self::for_platform(Platform::Unknown)
    }
}

impl GenericExtractor {
    pub fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }

    fn body(&self, doc: &Document) -> Option<String> {
        let excluded = exclusion(BOILERPLATE);
        let from_container = doc.first_accepted(BODY_RULES, excluded.as_ref(), |raw| {
            let body = clean_text(raw);
            (char_len(&body) > BODY_MIN_CHARS).then(|| truncate_chars(&body, BODY_MAX_CHARS, "..."))
        });
        if from_container.is_some() {
            return from_container;
        }

        let page = clean_text(&doc.page_text(excluded.as_ref()));
        (char_len(&page) > PAGE_TEXT_MIN_CHARS).then(|| truncate_chars(&page, BODY_MAX_CHARS, "..."))
    }
}

fn origin_of(source_url: &str) -> String {
    Url::parse(source_url)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| source_url.to_string())
}

impl PageExtractor for GenericExtractor {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn can_handle(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
    }

    fn extract(&self, html: &str, source_url: &str) -> ExtractedContent {
        let doc = Document::parse(html);
        let mut images = Vec::new();
        collect_images(&doc, &self.image_filter(source_url), IMAGE_SOURCES, &mut images);

        let fallback = Platform::Unknown;
        let draft = ContentDraft {
            title: doc
                .first_accepted(TITLE_RULES, None, |raw| {
                    let title = clean_text(raw);
                    (!title.is_empty()).then_some(title)
                })
                .or_else(|| Some(fallback.placeholder_title().to_string())),
            body: self
                .body(&doc)
                .or_else(|| Some(fallback.placeholder_body().to_string())),
            images,
            author: first_author(&doc, AUTHOR_RULES, AUTHOR_MAX_CHARS, |_| false),
            published_at: first_date(&doc, DATE_RULES),
        };

        ExtractedContent::new(self.platform, source_url, draft)
    }

    /// A known platform's own filter; image-like URLs from any host otherwise.
    fn image_filter(&self, source_url: &str) -> ImageFilter {
        match platform_extractor(self.platform) {
            Some(page) => page.image_filter(source_url),
            None => ImageFilter::image_like(origin_of(source_url)),
        }
    }
}
