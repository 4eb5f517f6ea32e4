use encoding_rs::Encoding;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::fetcher::types::Charset;

const SNIFF_WINDOW: usize = 4096;

static HEADER_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).expect("header charset regex")
});

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).expect("meta charset regex")
});

/// Picks the body's encoding: BOM, then the Content-Type header, then a
/// `<meta>` declaration in the first few KB, then statistical detection.
pub fn sniff_charset(content_type: &str, body: &[u8]) -> Charset {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return Charset::new(encoding);
    }

    if let Some(encoding) = label_from(&HEADER_CHARSET, content_type) {
        return Charset::new(encoding);
    }

    let head = String::from_utf8_lossy(&body[..body.len().min(SNIFF_WINDOW)]);
    if let Some(encoding) = label_from(&META_CHARSET, &head) {
        return Charset::new(encoding);
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    Charset::new(detector.guess(None, true))
}

fn label_from(pattern: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let label = pattern.captures(haystack)?.get(1)?.as_str().to_ascii_lowercase();
    Encoding::for_label(label.as_bytes())
}

/// Decodes `body` to UTF-8. Malformed sequences become U+FFFD rather than failing the page.
pub fn decode_html(content_type: &str, body: &[u8]) -> (String, Charset) {
    let charset = sniff_charset(content_type, body);
    let (decoded, actual, had_errors) = charset.encoding().decode(body);
    if had_errors {
        warn!(charset = actual.name(), "Body contained malformed sequences");
    }
    (decoded.into_owned(), Charset::new(actual))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_from_content_type() {
        let body = b"<html><head><title>Test</title></head></html>";
        assert!(sniff_charset("text/html; charset=utf-8", body).is_utf8());
    }

    #[test]
    fn test_charset_from_meta_tag() {
        let body = b"<html><head><meta charset=\"gbk\"><title>x</title></head></html>";
        assert_eq!(sniff_charset("text/html", body).name(), "GBK");
    }

    #[test]
    fn test_charset_from_http_equiv() {
        let body = b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"></head></html>";
        assert_eq!(sniff_charset("text/html", body).name(), "windows-1252");
    }

    #[test]
    fn test_decode_gbk_page() {
        let (encoded, _, _) = encoding_rs::GBK.encode("<html><body>你好，世界</body></html>");
        let (decoded, charset) = decode_html("text/html; charset=gbk", &encoded);
        assert_eq!(charset.name(), "GBK");
        assert!(decoded.contains("你好，世界"));
    }

    #[test]
    fn test_bom_wins_over_header() {
        let mut body = vec![0xEF, 0xBB, 0xBF];
        body.extend_from_slice("标题".as_bytes());
        let (decoded, charset) = decode_html("text/html; charset=iso-8859-1", &body);
        assert!(charset.is_utf8());
        assert_eq!(decoded, "标题");
    }

    #[test]
    fn test_malformed_bytes_are_replaced() {
        let (decoded, _) = decode_html("text/html; charset=utf-8", b"ok \xFF end");
        assert!(decoded.starts_with("ok "));
        assert!(decoded.contains('\u{FFFD}'));
    }
}
