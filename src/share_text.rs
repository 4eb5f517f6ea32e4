use regex::Regex;
use std::sync::LazyLock;

use crate::extractor::is_supported;

pub const MAX_SHARE_TEXT_CHARS: usize = 5000;

// stops at whitespace, CJK punctuation and fullwidth forms
static URL_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s\u{3000}-\u{303F}\u{FF00}-\u{FFEF}]+").expect("share url regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTextError {
    /// Empty, blank or longer than [`MAX_SHARE_TEXT_CHARS`].
    NoUrl,
    /// URLs were found but none belongs to a supported platform.
    Unsupported(String),
}

/// Pulls the first supported-platform URL out of pasted share text.
///
/// A clean URL is passed through untouched, whatever its host.
pub fn find_share_url(input: &str) -> Result<String, ShareTextError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || input.chars().count() > MAX_SHARE_TEXT_CHARS {
        return Err(ShareTextError::NoUrl);
    }

    if is_clean_url(trimmed) {
        return Ok(trimmed.to_string());
    }

    let found: Vec<&str> = URL_IN_TEXT
        .find_iter(trimmed)
        .map(|m| m.as_str())
        .collect();

    match found.iter().find(|url| is_supported(url)) {
        Some(url) => Ok((*url).to_string()),
        None => match found.first() {
            Some(url) => Err(ShareTextError::Unsupported((*url).to_string())),
            None => Err(ShareTextError::NoUrl),
        },
    }
}

fn is_clean_url(text: &str) -> bool {
    (text.starts_with("http://") || text.starts_with("https://"))
        && URL_IN_TEXT.find(text).is_some_and(|m| m.start() == 0 && m.end() == text.len())
}
