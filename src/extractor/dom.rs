use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

/// How a value is read off the first element a selector matches.
#[derive(Debug, Clone, Copy)]
pub enum Read {
    Text,
    Attr(&'static str),
    AttrOrText(&'static str),
}

/// One candidate source for a field: a CSS selector plus a read rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub selector: &'static str,
    pub read: Read,
}

pub const fn text(selector: &'static str) -> Rule {
    Rule {
        selector,
        read: Read::Text,
    }
}

pub const fn attr(selector: &'static str, name: &'static str) -> Rule {
    Rule {
        selector,
        read: Read::Attr(name),
    }
}

pub const fn attr_or_text(selector: &'static str, name: &'static str) -> Rule {
    Rule {
        selector,
        read: Read::AttrOrText(name),
    }
}

pub const fn meta(selector: &'static str) -> Rule {
    attr(selector, "content")
}

/// Builds one selector out of a list of boilerplate selectors.
pub fn exclusion(selectors: &[&str]) -> Option<Selector> {
    parse_selector(&selectors.join(", "))
}

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            debug!(selector = css, error = %e, "Skipping invalid selector");
            None
        }
    }
}

/// Read-only query surface over a parsed page.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = parse_selector(css)?;
        self.html.select(&selector).next()
    }

    pub fn all(&self, css: &str) -> Vec<ElementRef<'_>> {
        match parse_selector(css) {
            Some(selector) => self.html.select(&selector).collect(),
            None => Vec::new(),
        }
    }

    /// Reads `rule` from its first matching element that sits outside `excluded`.
    pub fn read(&self, rule: &Rule, excluded: Option<&Selector>) -> Option<String> {
        let selector = parse_selector(rule.selector)?;
        let element = self
            .html
            .select(&selector)
            .find(|el| !is_excluded(el, excluded))?;

        let value = match rule.read {
            Read::Text => element_text(element, excluded),
            Read::Attr(name) => element.value().attr(name)?.to_string(),
            Read::AttrOrText(name) => match element.value().attr(name) {
                Some(value) if !value.trim().is_empty() => value.to_string(),
                _ => element_text(element, excluded),
            },
        };

        Some(value)
    }

    /// Walks `rules` in order and returns the first value `accept` keeps.
    pub fn first_accepted(
        &self,
        rules: &[Rule],
        excluded: Option<&Selector>,
        mut accept: impl FnMut(&str) -> Option<String>,
    ) -> Option<String> {
        rules
            .iter()
            .filter_map(|rule| self.read(rule, excluded))
            .find_map(|value| accept(&value))
    }

    /// The `content` attribute of every element matching `css`.
    pub fn meta_contents(&self, css: &str) -> Vec<String> {
        self.all(css)
            .into_iter()
            .filter_map(|el| el.value().attr("content"))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// For each element matching `css`, the non-empty values of `attrs` in order.
    pub fn attribute_candidates(&self, css: &str, attrs: &[&str]) -> Vec<Vec<String>> {
        self.all(css)
            .into_iter()
            .map(|el| {
                attrs
                    .iter()
                    .filter_map(|name| el.value().attr(name))
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|values| !values.is_empty())
            .collect()
    }

    /// Text of the whole `<body>` (or the root when there is none), skipping `excluded` subtrees.
    pub fn page_text(&self, excluded: Option<&Selector>) -> String {
        match self.first("body") {
            Some(body) => element_text(body, excluded),
            None => element_text(self.html.root_element(), excluded),
        }
    }

    /// Text of every `<script>` element, used for inline page-state data.
    pub fn script_text(&self) -> String {
        self.all("script")
            .into_iter()
            .map(|el| el.text().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_excluded(element: &ElementRef<'_>, excluded: Option<&Selector>) -> bool {
    let Some(excluded) = excluded else {
        return false;
    };
    excluded.matches(element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| excluded.matches(&ancestor))
}

/// Concatenated descendant text of `element`, leaving out subtrees matching `excluded`.
pub fn element_text(element: ElementRef<'_>, excluded: Option<&Selector>) -> String {
    let mut out = String::new();
    collect_text(element, excluded, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, excluded: Option<&Selector>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    if excluded.is_some_and(|selector| selector.matches(&child_element)) {
                        continue;
                    }
                    collect_text(child_element, excluded, out);
                }
            }
            _ => {}
        }
    }
}
