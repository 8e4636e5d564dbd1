//! Structural locators for price text inside provider responses.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::data_source::FetchError;

/// One way of finding price text in a response body. Adapters keep an ordered
/// list; the first locator yielding non-empty text wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Text content of the first element whose opening tag contains `marker`
    /// (a class list fragment or a bare attribute name).
    Element(&'static str),
    /// Value of the first `name="..."` attribute.
    Attribute(&'static str),
    /// `content` of `<meta name="..." content="...">`.
    Meta(&'static str),
    /// RFC 6901 pointer into a JSON body.
    JsonPointer(&'static str),
}

impl Locator {
    fn find_html(self, body: &str) -> Result<Option<String>, FetchError> {
        match self {
            Self::Element(marker) => element_text(body, marker),
            Self::Attribute(name) => Ok(attribute_value(body, name)?.map(|value| clean_text(&value))),
            Self::Meta(name) => meta_content(body, name),
            Self::JsonPointer(_) => Ok(None),
        }
    }

    fn find_json(self, document: &Value) -> Option<String> {
        let Self::JsonPointer(pointer) = self else {
            return None;
        };
        match document.pointer(pointer)? {
            Value::Number(number) => Some(number.to_string()),
            Value::String(text) => Some(text.trim().to_owned()),
            _ => None,
        }
    }
}

/// Run `locators` in order over an HTML body.
pub fn locate_html(body: &str, locators: &[Locator]) -> Result<Option<String>, FetchError> {
    for locator in locators {
        if let Some(text) = locator.find_html(body)?.filter(|text| !text.is_empty()) {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Run `locators` in order over a parsed JSON document.
pub fn locate_json(document: &Value, locators: &[Locator]) -> Option<String> {
    locators
        .iter()
        .filter_map(|locator| locator.find_json(document))
        .find(|text| !text.is_empty())
}

fn element_text(body: &str, marker: &str) -> Result<Option<String>, FetchError> {
    let opening = cached(PatternKind::Element, marker)?;

    let Some(captures) = opening.captures(body) else {
        return Ok(None);
    };
    let (Some(whole), Some(tag)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };

    let inner = &body[whole.end()..];
    let closing = format!("</{}", tag.as_str());
    let end = find_ignore_case(inner, &closing).unwrap_or(inner.len());
    Ok(Some(clean_text(&inner[..end])))
}

fn attribute_value(fragment: &str, name: &str) -> Result<Option<String>, FetchError> {
    let attribute = cached(PatternKind::Attribute, name)?;

    Ok(attribute.captures(fragment).and_then(|captures| {
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|value| value.as_str().to_owned())
    }))
}

fn meta_content(body: &str, name: &str) -> Result<Option<String>, FetchError> {
    let meta = cached(PatternKind::Meta, name)?;

    match meta.find(body) {
        Some(tag) => Ok(attribute_value(tag.as_str(), "content")?.map(|value| clean_text(&value))),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PatternKind {
    Element,
    Attribute,
    Meta,
}

impl PatternKind {
    fn pattern(self, name: &str) -> String {
        let name = regex::escape(name);
        match self {
            Self::Element => format!(r"(?is)<([a-z][a-z0-9-]*)\b[^>]*{name}[^>]*>"),
            Self::Attribute => format!(r#"(?i)[\s<]{name}\s*=\s*(?:"([^"]*)"|'([^']*)')"#),
            Self::Meta => {
                format!(r#"(?i)<meta\b[^>]*(?:name|property|itemprop)\s*=\s*["']{name}["'][^>]*>"#)
            }
        }
    }
}

type PatternCache = Mutex<HashMap<(PatternKind, String), Regex>>;

/// Compiled locator pattern, built once per kind and name.
fn cached(kind: PatternKind, name: &str) -> Result<Regex, FetchError> {
    static CACHE: OnceLock<PatternCache> = OnceLock::new();
    let cache = CACHE.get_or_init(PatternCache::default);

    let key = (kind, name.to_owned());
    if let Some(regex) = cache
        .lock()
        .expect("locator cache should not be poisoned")
        .get(&key)
    {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&kind.pattern(name))
        .map_err(|e| FetchError::internal(format!("invalid locator pattern: {e}")))?;
    cache
        .lock()
        .expect("locator cache should not be poisoned")
        .insert(key, regex.clone());
    Ok(regex)
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Strip tags, decode entities and collapse ASCII whitespace.
pub fn clean_text(fragment: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static tag pattern"));

    let without_tags = tags.replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    decoded.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the named and numeric entities found around prices. NBSP variants
/// are kept as U+00A0 / U+202F so the price parser can tell a grouping space
/// from a word break.
pub fn decode_entities(text: &str) -> String {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let numeric = NUMERIC.get_or_init(|| {
        Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").expect("static entity pattern")
    });

    let named = [
        ("&nbsp;", "\u{a0}"),
        ("&euro;", "€"),
        ("&pound;", "£"),
        ("&yen;", "¥"),
        ("&dollar;", "$"),
        ("&quot;", "\""),
        ("&apos;", "'"),
        ("&lt;", "<"),
        ("&gt;", ">"),
    ]
    .iter()
    .fold(text.to_owned(), |text, (entity, replacement)| {
        text.replace(entity, replacement)
    });

    let decoded = numeric.replace_all(&named, |captures: &regex::Captures<'_>| {
        let code = match (captures.get(1), captures.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(decimal)) => decimal.as_str().parse::<u32>().ok(),
            (None, None) => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    decoded.replace("&amp;", "&")
}
