//! Regex fallbacks over raw markup for dates the DOM strategies miss.

use crate::normalize::normalize;
use crate::{Document, Extractor, RawDateValue};
use lastmod_common::Method;
use regex::Regex;
use std::sync::LazyLock;

/// `(id, pattern)` in priority order; capture group 1 is the date candidate.
const PATTERN_SOURCES: &[(&str, &str)] = &[
    ("datetime-attr", r#"(?i)\bdatetime\s*=\s*["']([^"']+)["']"#),
    (
        "published-date-attr",
        r#"(?i)\bpublished[-_]date\s*=\s*["']([^"']+)["']"#,
    ),
    (
        "date-class-text",
        r#"(?i)class\s*=\s*["'][^"']*\b(?:date|time|timestamp|publish(?:ed)?)[^"']*["'][^>]*>\s*([^<]{4,80}?)\s*<"#,
    ),
    ("data-date-attr", r#"(?i)\bdata-date\s*=\s*["']([^"']+)["']"#),
    ("json-date-published", r#""datePublished"\s*:\s*"([^"]+)""#),
    ("json-date-modified", r#""dateModified"\s*:\s*"([^"]+)""#),
    (
        "iso-datetime",
        r"\b(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)",
    ),
    ("iso-date", r"\b(\d{4}[-/]\d{2}[-/]\d{2})\b"),
];

static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PATTERN_SOURCES
        .iter()
        .map(|(id, src)| (*id, Regex::new(src).expect("valid date pattern")))
        .collect()
});

#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

impl PatternExtractor {
    /// Run the patterns directly over text, without a parsed document.
    pub fn extract_text(&self, raw: &str) -> Option<RawDateValue> {
        for (id, re) in PATTERNS.iter() {
            for caps in re.captures_iter(raw) {
                let Some(m) = caps.get(1) else { continue };
                let candidate = RawDateValue::text(m.as_str().trim(), format!("pattern:{id}"));
                if normalize(Some(&candidate)).is_some() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

impl Extractor for PatternExtractor {
    fn method(&self) -> Method {
        Method::Pattern
    }

    fn extract(&self, doc: &Document<'_>) -> Option<RawDateValue> {
        self.extract_text(doc.raw())
    }
}
