use regex::Regex;
use std::{collections::HashSet, sync::LazyLock};
use url::Url;

pub const MAX_IMAGES: usize = 9;

/// Image hosts trusted even when the URL carries no file extension.
pub const KNOWN_IMAGE_CDNS: &[&str] = &[
    "xhscdn.com",
    "hdslb.com",
    "biliimg.com",
    "sinaimg.cn",
    "qpic.cn",
    "alicdn.com",
    "xiaohongshu.com",
];

const UI_ASSET_MARKERS: &[&str] = &["avatar", "icon", "logo", "emoji", "sprite"];

static IMAGE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg)$").expect("image extension regex")
});

static FORMAT_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&/]format[=/](jpg|jpeg|png|gif|webp|svg)").expect("format regex")
});

static TINY_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(16|24|32|40|48)/|/(16x16|24x24|32x32|40x40|48x48)").expect("tiny image regex")
});

/// An image extension, a declared image format, or a known image CDN host.
pub fn has_image_signal(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    IMAGE_EXTENSION.is_match(&path)
        || FORMAT_DECLARATION.is_match(&url.as_str().to_ascii_lowercase())
        || KNOWN_IMAGE_CDNS.iter().any(|cdn| host.ends_with(cdn))
}

#[derive(Debug, Clone)]
enum HostRequirement {
    /// Extension, declared format or a known CDN.
    ImageLike,
    /// URL contains one of the platform's own CDN markers.
    Markers(&'static [&'static str]),
}

/// Decides which URLs count as content imagery and normalizes them.
///
/// Each extractor builds its own filter: the canonical origin used to absolutize
/// relative URLs, the host requirement, and extra reject markers.
#[derive(Debug, Clone)]
pub struct ImageFilter {
    origin: String,
    requirement: HostRequirement,
    rejects: &'static [&'static str],
}

impl ImageFilter {
    pub fn image_like(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            requirement: HostRequirement::ImageLike,
            rejects: &[],
        }
    }

    pub fn own_cdn(origin: impl Into<String>, markers: &'static [&'static str]) -> Self {
        Self {
            origin: origin.into(),
            requirement: HostRequirement::Markers(markers),
            rejects: &[],
        }
    }

    pub fn rejecting(mut self, markers: &'static [&'static str]) -> Self {
        self.rejects = markers;
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Turns protocol-relative and relative URLs into absolute ones.
    pub fn normalize(&self, raw: &str) -> String {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("//") {
            return format!("https://{rest}");
        }
        if Url::parse(raw).is_ok() {
            return raw.to_string();
        }
        match Url::parse(&self.origin).and_then(|base| base.join(raw)) {
            Ok(joined) => joined.to_string(),
            Err(_) => raw.to_string(),
        }
    }

    pub fn is_content_image(&self, candidate: &str) -> bool {
        let Ok(url) = Url::parse(candidate.trim()) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        let path = url.path().to_ascii_lowercase();
        if UI_ASSET_MARKERS.iter().any(|m| path.contains(m)) || TINY_IMAGE.is_match(&path) {
            return false;
        }

        let lowered = candidate.to_ascii_lowercase();
        if self.rejects.iter().any(|m| lowered.contains(m)) {
            return false;
        }

        match &self.requirement {
            HostRequirement::ImageLike => has_image_signal(&url),
            HostRequirement::Markers(markers) => markers.iter().any(|m| lowered.contains(m)),
        }
    }

    /// Normalizes `candidate` and returns it only when it is content imagery.
    pub fn accept(&self, candidate: &str) -> Option<String> {
        let normalized = self.normalize(candidate);
        self.is_content_image(&normalized).then_some(normalized)
    }

    /// First acceptable value among an element's lazy-load attributes.
    pub fn accept_first<S: AsRef<str>>(&self, candidates: &[S]) -> Option<String> {
        candidates.iter().find_map(|c| self.accept(c.as_ref()))
    }

    pub fn dedupe_and_cap(urls: Vec<String>, cap: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        urls.into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty() && seen.insert(url.clone()))
            .take(cap)
            .collect()
    }
}
