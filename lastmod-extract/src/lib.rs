//! Date extraction strategies over fetched markup.
//!
//! Each strategy implements [`Extractor`] and skips candidates that do not
//! parse, so a returned [`RawDateValue`] is always usable. [`StrategyChain`]
//! runs the strategies in priority order, converts the first hit to UTC, and
//! treats a strategy that panics as one that found nothing.
pub mod chain;
pub mod jsonld;
pub mod meta;
pub mod normalize;
pub mod pattern;
pub mod time_tag;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use lastmod_common::Method;
use scraper::Html;

pub use chain::{Resolved, StrategyChain};
pub use jsonld::JsonLdExtractor;
pub use meta::MetaTagExtractor;
pub use normalize::{normalize, parse_date_str};
pub use pattern::PatternExtractor;
pub use time_tag::TimeTagExtractor;

/// An extracted value before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Instant(DateTime<FixedOffset>),
    /// Timezone-less date-time; normalized as UTC.
    Naive(NaiveDateTime),
    /// Unix epoch, seconds or milliseconds (told apart by magnitude).
    Timestamp(i64),
}

/// A candidate date plus where it came from (e.g. `meta:article:modified_time`).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDateValue {
    pub value: RawValue,
    pub source: String,
}

impl RawDateValue {
    pub fn text(value: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            value: RawValue::Text(value.into()),
            source: source.into(),
        }
    }

    pub fn timestamp(value: i64, source: impl Into<String>) -> Self {
        Self {
            value: RawValue::Timestamp(value),
            source: source.into(),
        }
    }
}

/// Parsed page handed to every extractor.
///
/// `scraper::Html` is not `Send`; a `Document` lives only inside synchronous
/// extraction and never across an `.await`.
pub struct Document<'a> {
    raw: &'a str,
    html: Html,
}

impl<'a> Document<'a> {
    pub fn parse(raw: &'a str) -> Self {
        Self {
            raw,
            html: Html::parse_document(raw),
        }
    }

    pub fn raw(&self) -> &str {
        self.raw
    }

    pub fn html(&self) -> &Html {
        &self.html
    }
}

/// One date-finding strategy.
pub trait Extractor: Send + Sync {
    /// Method reported on results produced by this strategy.
    fn method(&self) -> Method;

    /// First parseable date this strategy can find, if any.
    fn extract(&self, doc: &Document<'_>) -> Option<RawDateValue>;
}
