use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;
use url::Url;

use crate::extractor::model::Platform;

static HOST_PATTERNS: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    [
        (Platform::Xiaohongshu, r"(^|\.)(xiaohongshu\.com|xhslink\.com|xhscdn\.com)$"),
        (Platform::Bilibili, r"(^|\.)(bilibili\.com|b23\.tv|bili\.com)$"),
        (Platform::Wechat, r"^mp\.weixin\.qq\.com$"),
    ]
    .into_iter()
    .map(|(platform, pattern)| (platform, Regex::new(pattern).expect("platform host regex")))
    .collect()
});

/// Maps a URL to the platform whose host patterns it matches; first match wins.
pub fn detect_platform(url: &str) -> Platform {
    let host = match Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return Platform::Unknown,
        },
        Err(e) => {
            warn!(url, error = %e, "Platform detection on malformed URL");
            return Platform::Unknown;
        }
    };

    HOST_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&host))
        .map(|(platform, _)| *platform)
        .unwrap_or(Platform::Unknown)
}

pub fn is_supported(url: &str) -> bool {
    detect_platform(url) != Platform::Unknown
}

pub fn supported_platforms() -> &'static [Platform] {
    &Platform::SUPPORTED
}

/// True when the host of `url` equals or is a subdomain of one of `domains`.
pub fn host_matches(url: &str, domains: &[&str]) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    domains
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}
