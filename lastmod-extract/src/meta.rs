//! `<meta>` tag date extraction.

use crate::normalize::normalize;
use crate::{Document, Extractor, RawDateValue};
use lastmod_common::Method;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

static SELECTOR_META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("valid meta selector"));

/// Property/name values checked in priority order.
pub const META_PROPERTIES: &[&str] = &[
    "article:modified_time",
    "article:published_time",
    "og:updated_time",
    "og:published_time",
    "lastmod",
    "last-modified",
    "pubdate",
    "publishdate",
    "publish-date",
    "date",
    // publisher conventions
    "dc.date",
    "dc.date.issued",
    "dcterms.modified",
    "dcterms.created",
    "sailthru.date",
    "parsely-pub-date",
    "article.published",
    "article_date_original",
    "cxenseparse:recs:publishtime",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct MetaTagExtractor;

impl Extractor for MetaTagExtractor {
    fn method(&self) -> Method {
        Method::Meta
    }

    fn extract(&self, doc: &Document<'_>) -> Option<RawDateValue> {
        let metas: Vec<ElementRef<'_>> = doc.html().select(&SELECTOR_META).collect();
        for name in META_PROPERTIES {
            for el in metas.iter().filter(|el| matches_name(el, name)) {
                let Some(content) = el.value().attr("content").map(str::trim) else {
                    continue;
                };
                if content.is_empty() {
                    continue;
                }
                let raw = RawDateValue::text(content, format!("meta:{name}"));
                if normalize(Some(&raw)).is_some() {
                    return Some(raw);
                }
            }
        }
        None
    }
}

fn matches_name(el: &ElementRef<'_>, name: &str) -> bool {
    let v = el.value();
    [v.attr("property"), v.attr("name")]
        .into_iter()
        .flatten()
        .any(|attr| attr.trim().eq_ignore_ascii_case(name))
}
