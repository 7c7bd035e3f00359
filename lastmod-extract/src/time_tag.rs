//! Last-resort `<time>` element lookup.

use crate::normalize::normalize;
use crate::{Document, Extractor, RawDateValue};
use lastmod_common::Method;
use scraper::Selector;
use std::sync::LazyLock;

static SELECTOR_TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time").expect("valid time selector"));

const TIME_ATTRIBUTES: [&str; 3] = ["datetime", "data-datetime", "data-date"];

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeTagExtractor;

impl Extractor for TimeTagExtractor {
    fn method(&self) -> Method {
        Method::TimeTag
    }

    /// Only the first `<time>` in the document is consulted; its attributes
    /// are tried in order and the first one that parses is used.
    fn extract(&self, doc: &Document<'_>) -> Option<RawDateValue> {
        let el = doc.html().select(&SELECTOR_TIME).next()?;
        TIME_ATTRIBUTES.iter().find_map(|attr| {
            let value = el.value().attr(attr)?.trim();
            if value.is_empty() {
                return None;
            }
            let raw = RawDateValue::text(value, format!("time-tag:{attr}"));
            normalize(Some(&raw)).map(|_| raw)
        })
    }
}
