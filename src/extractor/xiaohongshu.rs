use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::extractor::{
    LoadStrategy, PageExtractor,
    cleaner::{char_len, clean_text, strip_matches, truncate_chars},
    dates::find_date,
    dom::{Document, Rule, exclusion, meta, text},
    fields::{OG_IMAGE, collect_images, first_author, image_source, ImageSource},
    images::{ImageFilter, MAX_IMAGES},
    model::{ContentDraft, ExtractedContent, Platform},
    platform::host_matches,
};

pub const ORIGIN: &str = "https://www.xiaohongshu.com";

/// When the social meta tags already carry this many images, page scanning is skipped.
pub const SUFFICIENT_META_IMAGES: usize = 3;

const TITLE_MAX_CHARS: usize = 50;
const BODY_MIN_CHARS: usize = 20;
const PAGE_TEXT_MIN_CHARS: usize = 50;
const PAGE_TEXT_MAX_CHARS: usize = 500;
const AUTHOR_MAX_CHARS: usize = 50;

const CDN_MARKERS: &[&str] = &["xhscdn", "xiaohongshu", "sns-webpic", "picasso-static"];

const TITLE_RULES: &[Rule] = &[
    meta(r#"meta[property="og:title"], meta[name="og:title"]"#),
    text("#detail-title"),
    text(".note-title"),
    text(".title"),
    text("title"),
    text("#detail-desc"),
    text(".desc"),
    text(".note-content"),
];

const BOILERPLATE: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", ".sidebar", ".related",
];

const BODY_RULES: &[Rule] = &[
    text("#detail-desc"),
    text(".note-content"),
    text(".content"),
    text(".desc"),
    text(".text-content"),
    text(".post-content"),
    text(".article-content"),
];

const IMAGE_SOURCES: &[ImageSource] = &[
    image_source(
        ".swiper-slide img",
        &["src", "data-src", "data-original", "data-lazy-src"],
    ),
    image_source(".note-slider-img", &["src", "data-src"]),
    image_source(".img-container img", &["src", "data-src"]),
    image_source(r#"img[src*="sns-webpic"], img[src*="webpic-qc"]"#, &["src"]),
    image_source(r#"img[src*="xhscdn"], img[src*="xiaohongshu"]"#, &["src"]),
];

const AUTHOR_RULES: &[Rule] = &[
    text(".author-wrapper .username"),
    text(".author-name"),
    text(".username"),
    text(".user-name"),
    text(".nickname"),
    meta(r#"meta[name="author"]"#),
];

const DATE_SELECTORS: &[&str] = &[".note-content .date", ".bottom-container .date", ".date"];

const DELETED_MARKERS: &[&str] = &[
    "你访问的页面不见了",
    "页面不存在",
    "内容已删除",
    "笔记已删除",
    "content has been deleted",
    "note has been deleted",
];

const LOGIN_MARKERS: &[&str] = &[
    "请先登录",
    "需要登录",
    "登录小红书",
    "登录后推荐",
    "微信扫码",
    "新用户可直接登录",
    "用户协议",
    "log in to continue",
];

const RESTRICTED_MARKERS: &[&str] = &[
    "访问受限",
    "地区限制",
    "不在服务区域",
    "not available in your region",
];

pub const DELETED_MESSAGE: &str = "该小红书笔记已不存在或已被删除，可能是链接过期或内容被作者删除";
pub const LOGIN_MESSAGE: &str = "该内容需要登录小红书才能访问。小红书对未登录用户限制了内容访问，建议在小红书 App 中打开链接，或复制页面 HTML 后通过 preloadedHtml 提交";
pub const RESTRICTED_MESSAGE: &str = "该内容存在访问限制，可能是地区限制或其他访问控制";

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("分享图片|分享视频|小红书|App|点赞|收藏|评论|关注").expect("noise regex")
});

static PAGE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("分享图片|分享视频|小红书|App|点赞|收藏|评论|关注|返回上一页|你还可以")
        .expect("page noise regex")
});

static SITE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[-|_]\s*小红书.*$").expect("site suffix regex"));

/// Server-side state of a note page, read from its visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Deleted,
    LoginRequired,
    Restricted,
    Normal,
}

impl PageState {
    pub fn detect(page_text: &str) -> Self {
        let lowered = page_text.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));
        if has(DELETED_MARKERS) {
            Self::Deleted
        } else if has(LOGIN_MARKERS) {
            Self::LoginRequired
        } else if has(RESTRICTED_MARKERS) {
            Self::Restricted
        } else {
            Self::Normal
        }
    }

    fn message(&self) -> Option<&'static str> {
        match self {
            Self::Deleted => Some(DELETED_MESSAGE),
            Self::LoginRequired => Some(LOGIN_MESSAGE),
            Self::Restricted => Some(RESTRICTED_MESSAGE),
            Self::Normal => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XiaohongshuExtractor;

impl XiaohongshuExtractor {
    pub fn new() -> Self {
        Self
    }

    fn title(&self, doc: &Document) -> Option<String> {
        doc.first_accepted(TITLE_RULES, None, |raw| {
            let title = clean_text(&SITE_SUFFIX.replace(raw, ""));
            let site_title =
                title.starts_with("小红书") || (title.contains("小红书") && char_len(&title) <= 10);
            if title.is_empty() || site_title {
                return None;
            }
            Some(truncate_chars(&title, TITLE_MAX_CHARS, "..."))
        })
    }

    fn body(&self, doc: &Document) -> Option<String> {
        let excluded = exclusion(BOILERPLATE);
        let page_text = clean_text(&doc.page_text(excluded.as_ref()));
        let state = PageState::detect(&page_text);

        if state == PageState::Deleted {
            return state.message().map(str::to_string);
        }

        let from_container = doc.first_accepted(BODY_RULES, excluded.as_ref(), |raw| {
            let candidate = clean_text(raw);
            if char_len(&candidate) <= BODY_MIN_CHARS {
                return None;
            }
            let stripped = strip_matches(&candidate, &NOISE);
            (char_len(&stripped) > BODY_MIN_CHARS).then_some(stripped)
        });
        if from_container.is_some() {
            return from_container;
        }

        if let Some(message) = state.message() {
            debug!(?state, "Note page is gated");
            return Some(message.to_string());
        }

        if char_len(&page_text) > PAGE_TEXT_MIN_CHARS {
            let stripped = strip_matches(&page_text, &PAGE_NOISE);
            if char_len(&stripped) > BODY_MIN_CHARS {
                return Some(truncate_chars(&stripped, PAGE_TEXT_MAX_CHARS, "..."));
            }
        }

        None
    }

    fn images(&self, doc: &Document) -> Vec<String> {
        let filter = self.filter();
        let mut images = Vec::new();
        collect_images(doc, &filter, &[OG_IMAGE], &mut images);

        if images.len() < SUFFICIENT_META_IMAGES {
            collect_images(doc, &filter, IMAGE_SOURCES, &mut images);
        }

        images.truncate(MAX_IMAGES);
        images
    }

    fn filter(&self) -> ImageFilter {
        ImageFilter::own_cdn(ORIGIN, CDN_MARKERS)
    }
}

impl PageExtractor for XiaohongshuExtractor {
    fn platform(&self) -> Platform {
        Platform::Xiaohongshu
    }

    fn can_handle(&self, url: &str) -> bool {
        host_matches(url, &["xiaohongshu.com", "xhslink.com"])
    }

    fn extract(&self, html: &str, source_url: &str) -> ExtractedContent {
        let doc = Document::parse(html);

        let draft = ContentDraft {
            title: self.title(&doc),
            body: self.body(&doc),
            images: self.images(&doc),
            author: first_author(&doc, AUTHOR_RULES, AUTHOR_MAX_CHARS, |name| {
                name.contains("小红书") || name == "用户"
            }),
            published_at: DATE_SELECTORS
                .iter()
                .filter_map(|css| doc.first(css))
                .find_map(|el| find_date(&el.text().collect::<String>())),
        };

        ExtractedContent::new(Platform::Xiaohongshu, source_url, draft)
    }

    fn image_filter(&self, _source_url: &str) -> ImageFilter {
        self.filter()
    }

    fn load_strategy(&self) -> LoadStrategy {
        LoadStrategy::HeadlessFirst
    }

    fn resolves_short_link(&self, url: &str) -> bool {
        host_matches(url, &["xhslink.com"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_state_detection() {
        assert_eq!(PageState::detect("抱歉，你访问的页面不见了"), PageState::Deleted);
        assert_eq!(PageState::detect("Content has been deleted"), PageState::Deleted);
        assert_eq!(PageState::detect("微信扫码 登录"), PageState::LoginRequired);
        assert_eq!(PageState::detect("该地区限制访问"), PageState::Restricted);
        assert_eq!(PageState::detect("今天的穿搭分享"), PageState::Normal);
    }

    #[test]
    fn test_short_site_title_is_skipped() {
        let doc = Document::parse(
            "<html><head><title>小红书</title></head><body><div class=\"desc\">周末去了一家很好吃的面包店</div></body></html>",
        );
        assert_eq!(
            XiaohongshuExtractor.title(&doc).as_deref(),
            Some("周末去了一家很好吃的面包店")
        );
    }

    #[test]
    fn test_title_site_suffix_removed_and_truncated() {
        let long = "长".repeat(60);
        let html = format!(
            "<html><head><meta property=\"og:title\" content=\"{long} - 小红书\"></head></html>"
        );
        let title = XiaohongshuExtractor.title(&Document::parse(&html)).unwrap();
        assert_eq!(title, format!("{}...", "长".repeat(50)));
    }

    #[test]
    fn test_can_handle() {
        assert!(XiaohongshuExtractor.can_handle("https://www.xiaohongshu.com/explore/1"));
        assert!(XiaohongshuExtractor.can_handle("http://xhslink.com/a/b"));
        assert!(!XiaohongshuExtractor.can_handle("https://www.bilibili.com/video/1"));
    }
}
