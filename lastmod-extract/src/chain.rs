use crate::normalize::normalize;
use crate::{
    Document, Extractor, JsonLdExtractor, MetaTagExtractor, PatternExtractor, TimeTagExtractor,
};
use chrono::{DateTime, Utc};
use lastmod_common::Method;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// A date found by one of the strategies, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub at: DateTime<Utc>,
    pub method: Method,
    pub source: String,
}

/// Ordered list of strategies; the first one whose value normalizes wins.
pub struct StrategyChain {
    extractors: Vec<Box<dyn Extractor>>,
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl StrategyChain {
    /// JSON-LD, meta tags, regex patterns, `<time>` element.
    ///
    /// ```
    /// use lastmod_common::Method;
    /// use lastmod_extract::StrategyChain;
    ///
    /// let html = r#"<html><head>
    ///   <meta property="article:published_time" content="2023-08-15T10:00:00Z">
    /// </head><body><time datetime="2020-01-01"></time></body></html>"#;
    ///
    /// let found = StrategyChain::standard().resolve(html).unwrap();
    /// assert_eq!(found.method, Method::Meta);
    /// assert_eq!(found.at.to_rfc3339(), "2023-08-15T10:00:00+00:00");
    /// ```
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(JsonLdExtractor),
            Box::new(MetaTagExtractor),
            Box::new(PatternExtractor),
            Box::new(TimeTagExtractor),
        ])
    }

    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    pub fn methods(&self) -> Vec<Method> {
        self.extractors.iter().map(|e| e.method()).collect()
    }

    /// Run every strategy in order over `markup`, stopping at the first hit.
    ///
    /// Extraction runs over untrusted markup: a strategy that panics is
    /// logged and counted as a miss, and the next one still runs.
    pub fn resolve(&self, markup: &str) -> Option<Resolved> {
        if self.extractors.is_empty() || markup.trim().is_empty() {
            return None;
        }
        let doc = match catch_unwind(|| Document::parse(markup)) {
            Ok(doc) => doc,
            Err(_) => {
                tracing::warn!(bytes = markup.len(), "extract.parse_panicked");
                return None;
            }
        };
        for extractor in &self.extractors {
            let method = extractor.method();
            let raw = match catch_unwind(AssertUnwindSafe(|| extractor.extract(&doc))) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    tracing::trace!(%method, "extract.strategy.miss");
                    continue;
                }
                Err(_) => {
                    tracing::warn!(%method, "extract.strategy.panicked");
                    continue;
                }
            };
            match normalize(Some(&raw)) {
                Some(at) => {
                    tracing::debug!(%method, source = %raw.source, %at, "extract.strategy.hit");
                    return Some(Resolved {
                        at,
                        method,
                        source: raw.source,
                    });
                }
                None => {
                    tracing::debug!(%method, source = %raw.source, "extract.strategy.unparseable");
                }
            }
        }
        None
    }
}
