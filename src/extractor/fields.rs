use chrono::{DateTime, Utc};

use crate::extractor::{
    cleaner::{char_len, clean_text},
    dates::parse_date,
    dom::{Document, Rule},
    images::ImageFilter,
};

/// Elements holding image URLs plus the attributes to try, in order.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource {
    pub selector: &'static str,
    pub attrs: &'static [&'static str],
}

pub const fn image_source(selector: &'static str, attrs: &'static [&'static str]) -> ImageSource {
    ImageSource { selector, attrs }
}

pub const OG_IMAGE: ImageSource = image_source(
    r#"meta[property="og:image"], meta[name="og:image"]"#,
    &["content"],
);

pub const TWITTER_IMAGE: ImageSource = image_source(
    r#"meta[name="twitter:image"], meta[property="twitter:image"]"#,
    &["content"],
);

/// Gathers filtered images from `sources`, keeping document order and skipping duplicates.
pub fn collect_images(
    doc: &Document,
    filter: &ImageFilter,
    sources: &[ImageSource],
    into: &mut Vec<String>,
) {
    for source in sources {
        for candidates in doc.attribute_candidates(source.selector, source.attrs) {
            if let Some(url) = filter.accept_first(&candidates)
                && !into.contains(&url)
            {
                into.push(url);
            }
        }
    }
}

/// First cleaned author name shorter than `max_chars` that `reject` does not veto.
pub fn first_author(
    doc: &Document,
    rules: &[Rule],
    max_chars: usize,
    reject: impl Fn(&str) -> bool,
) -> Option<String> {
    doc.first_accepted(rules, None, |raw| {
        let name = clean_text(raw);
        (!name.is_empty() && char_len(&name) < max_chars && !reject(&name)).then_some(name)
    })
}

pub fn first_date(doc: &Document, rules: &[Rule]) -> Option<DateTime<Utc>> {
    let mut found = None;
    doc.first_accepted(rules, None, |raw| {
        found = parse_date(raw);
        found.map(|_| String::new())
    });
    found
}
