//! Minimal HTML start-tag scanner.
//!
//! Codecs only need to find elements by attribute, edit a few attributes and
//! drop whole elements. Everything outside the touched tags is copied through
//! byte for byte, so untouched markup round-trips exactly.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<([a-zA-Z][a-zA-Z0-9-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
    )
    .expect("start tag pattern is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

/// Elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A parsed start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercased element name.
    pub name: String,
    /// Attributes in source order. Names are lowercased.
    pub attributes: Vec<(String, Option<String>)>,
    pub self_closing: bool,
}

impl StartTag {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let attributes = caps
            .get(2)
            .map(|m| {
                ATTRIBUTE
                    .captures_iter(m.as_str())
                    .filter_map(|attr| {
                        let key = attr.get(1)?.as_str().to_ascii_lowercase();
                        let value = attr
                            .get(2)
                            .or_else(|| attr.get(3))
                            .or_else(|| attr.get(4))
                            .map(|v| decode_entities(v.as_str()));
                        Some((key, value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());

        Self {
            name,
            attributes,
            self_closing,
        }
    }

    /// Value of an attribute. Valueless attributes read as `""`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| key == name) {
            slot.1 = Some(value.to_string());
        } else {
            self.attributes
                .push((name.to_string(), Some(value.to_string())));
        }
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(key, _)| key != name);
        before != self.attributes.len()
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.contains(&self.name.as_str())
    }

    /// Serialize back to markup.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            if let Some(value) = value {
                out.push_str("=\"");
                out.push_str(&encode_attribute(value));
                out.push('"');
            }
        }
        if self.self_closing {
            out.push_str(" /");
        }
        out.push('>');
        out
    }
}

/// Visit every start tag in order.
pub fn for_each_tag(html: &str, mut visit: impl FnMut(&StartTag)) {
    for caps in START_TAG.captures_iter(html) {
        visit(&StartTag::from_captures(&caps));
    }
}

/// Rewrite start tags in place.
///
/// `edit` returns `true` when it changed the tag; only changed tags are
/// re-rendered, every other byte is copied verbatim.
pub fn rewrite_tags(html: &str, mut edit: impl FnMut(&mut StartTag) -> bool) -> String {
    START_TAG
        .replace_all(html, |caps: &Captures<'_>| {
            let mut tag = StartTag::from_captures(caps);
            if edit(&mut tag) {
                tag.render()
            } else {
                caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default()
            }
        })
        .into_owned()
}

/// Drop every element whose start tag matches, including its children.
pub fn remove_elements(html: &str, mut matches: impl FnMut(&StartTag) -> bool) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    let mut pos = 0;

    while let Some(caps) = START_TAG.captures_at(html, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        let tag = StartTag::from_captures(&caps);
        if matches(&tag) {
            out.push_str(&html[cursor..whole.start()]);
            let end = if tag.is_void() {
                whole.end()
            } else {
                element_end(html, &tag.name, whole.end())
            };
            cursor = end;
            pos = end;
        } else {
            pos = whole.end();
        }
    }

    out.push_str(&html[cursor..]);
    out
}

/// Byte offset just past the close tag matching an element opened before
/// `from`. Unclosed elements only lose their start tag.
fn element_end(html: &str, name: &str, from: usize) -> usize {
    let pattern = format!(r"(?i)<(/?){}\b[^>]*>", regex::escape(name));
    let Ok(boundary) = Regex::new(&pattern) else {
        return from;
    };

    let mut depth = 1usize;
    for caps in boundary.captures_iter(&html[from..]) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return from + whole.end();
            }
        } else if !whole.as_str().ends_with("/>") {
            depth += 1;
        }
    }

    debug!(element = name, "Unclosed element, removing start tag only");
    from
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn encode_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes() {
        let mut seen = Vec::new();
        for_each_tag(
            r#"<p>x</p><IMG data-hash="abc" alt='a > b' hidden src=foo.png>"#,
            |tag| seen.push(tag.clone()),
        );
        assert_eq!(seen.len(), 2);
        let img = &seen[1];
        assert_eq!(img.name, "img");
        assert_eq!(img.get("data-hash"), Some("abc"));
        assert_eq!(img.get("alt"), Some("a > b"));
        assert_eq!(img.get("hidden"), Some(""));
        assert_eq!(img.get("src"), Some("foo.png"));
    }

    #[test]
    fn test_rewrite_only_touches_changed_tags() {
        let html = r#"<p class=x>hi</p><img src="a.png">"#;
        let out = rewrite_tags(html, |tag| {
            if tag.name == "img" {
                tag.set("data-hash", "h1");
                tag.remove("src")
            } else {
                false
            }
        });
        assert_eq!(out, r#"<p class=x>hi</p><img data-hash="h1">"#);
    }

    #[test]
    fn test_remove_nested_element() {
        let html = r#"<p>a</p><span data-hash="h"><span>inner</span>tail</span><p>b</p>"#;
        let out = remove_elements(html, |tag| tag.get("data-hash") == Some("h"));
        assert_eq!(out, "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_remove_void_element() {
        let html = r#"<p>a<img data-hash="h">b</p>"#;
        let out = remove_elements(html, |tag| tag.get("data-hash") == Some("h"));
        assert_eq!(out, "<p>ab</p>");
    }

    #[test]
    fn test_attribute_entities_round_trip() {
        let html = r#"<a title="x &amp; &quot;y&quot;" href="/">"#;
        let out = rewrite_tags(html, |tag| {
            tag.set("rel", "nofollow");
            true
        });
        assert_eq!(
            out,
            r#"<a title="x &amp; &quot;y&quot;" href="/" rel="nofollow">"#
        );
    }
}
