use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static BRACKET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*【[^】]*】\s*").expect("bracket prefix regex"));

/// Collapses every whitespace run to a single space and trims the ends.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Cuts `text` to at most `max_chars` characters, appending `suffix` when cut.
pub fn truncate_chars(text: &str, max_chars: usize, suffix: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], suffix),
        None => text.to_string(),
    }
}

/// Character-boundary-safe prefix of at most `max_chars` characters.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Removes every match of `pattern` and re-normalizes whitespace.
pub fn strip_matches(text: &str, pattern: &Regex) -> String {
    clean_text(&pattern.replace_all(text, ""))
}

/// Drops a leading `【tag】` label.
pub fn strip_bracket_prefix(text: &str) -> String {
    BRACKET_PREFIX.replace(text, "").trim().to_string()
}
