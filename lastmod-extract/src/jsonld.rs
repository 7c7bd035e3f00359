//! JSON-LD (`<script type="application/ld+json">`) date extraction.

use crate::normalize::normalize;
use crate::{Document, Extractor, RawDateValue};
use lastmod_common::Method;
use scraper::Selector;
use serde_json::Value;
use std::sync::LazyLock;

static SELECTOR_SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[type]").expect("valid script selector"));

/// Date fields in priority order.
pub const DATE_FIELDS: [&str; 4] = ["dateModified", "datePublished", "dateCreated", "uploadDate"];

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLdExtractor;

impl Extractor for JsonLdExtractor {
    fn method(&self) -> Method {
        Method::JsonLd
    }

    fn extract(&self, doc: &Document<'_>) -> Option<RawDateValue> {
        for (idx, element) in doc.html().select(&SELECTOR_SCRIPT).enumerate() {
            let is_ld = element
                .value()
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"));
            if !is_ld {
                continue;
            }
            let text: String = element.text().collect();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let value = match serde_json::from_str::<Value>(text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::trace!(block = idx, error = %e, "extract.jsonld.skip_malformed");
                    continue;
                }
            };
            // Lists: only the first element is inspected.
            let node = match &value {
                Value::Array(items) => match items.first() {
                    Some(first) => first,
                    None => continue,
                },
                other => other,
            };
            if let Some(found) = date_from_node(node) {
                return Some(found);
            }
            if let Some(found) = node
                .get("@graph")
                .and_then(Value::as_array)
                .and_then(|graph| graph.iter().find_map(date_from_node))
            {
                return Some(found);
            }
        }
        None
    }
}

fn date_from_node(node: &Value) -> Option<RawDateValue> {
    DATE_FIELDS.iter().find_map(|field| {
        let source = format!("json-ld:{field}");
        let raw = match node.get(*field)? {
            Value::String(s) if !s.trim().is_empty() => RawDateValue::text(s.trim(), source),
            Value::Number(n) => RawDateValue::timestamp(n.as_i64()?, source),
            _ => return None,
        };
        normalize(Some(&raw)).map(|_| raw)
    })
}
