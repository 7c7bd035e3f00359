use lastmod_common::{LastmodError, Method, ResolutionResult};
use lastmod_config::ResolverSettings;
use lastmod_extract::{StrategyChain, parse_date_str};
use lastmod_http::{FetchError, FetchedPage, PageFetcher, PageSource};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const HEADER_SOURCE: &str = "http-header";

/// Fetch + ordered strategy chain for a single URL.
///
/// Order: `Last-Modified` header, JSON-LD, meta tags, regex patterns,
/// `<time>` element. The first value that normalizes wins.
#[derive(Clone)]
pub struct DateResolutionPipeline {
    source: Arc<dyn PageSource>,
    chain: Arc<StrategyChain>,
}

impl DateResolutionPipeline {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            chain: Arc::new(StrategyChain::standard()),
        }
    }

    /// Build a pipeline around a [`PageFetcher`] configured from `settings`.
    pub fn from_settings(settings: &ResolverSettings) -> Result<Self, LastmodError> {
        settings
            .validate()
            .map_err(|e| LastmodError::Config(e.to_string()))?;
        let fetcher =
            PageFetcher::from_settings(settings).map_err(|e| LastmodError::Client(e.to_string()))?;
        Ok(Self::new(Arc::new(fetcher)))
    }

    /// Replace the body strategies (the header shortcut always runs first).
    pub fn with_chain(mut self, chain: StrategyChain) -> Self {
        self.chain = Arc::new(chain);
        self
    }

    /// Resolve one URL. Never fails; failures are recorded on the result.
    pub async fn resolve(&self, url: &str) -> ResolutionResult {
        self.resolve_until(url, &CancellationToken::new()).await
    }

    /// Like [`resolve`](Self::resolve), but a cancelled token aborts the
    /// fetch and reports it as a timeout.
    pub async fn resolve_until(&self, url: &str, cancel: &CancellationToken) -> ResolutionResult {
        let started = Instant::now();
        tracing::debug!(url, "resolve.start");

        let fetched = tokio::select! {
            res = self.source.fetch(url) => res,
            _ = cancel.cancelled() => Err(FetchError::Timeout),
        };

        let result = match fetched {
            Ok(page) => self.resolve_page(url, &page),
            Err(err) => {
                tracing::warn!(url, error = %err, "resolve.fetch_failed");
                ResolutionResult::failed(url, err.kind())
            }
        };

        tracing::info!(
            url,
            method = ?result.method,
            resolved_date = ?result.resolved_date,
            error = ?result.error,
            duration_ms = started.elapsed().as_millis() as u64,
            "resolve.done"
        );
        result
    }

    /// Resolve from an already fetched page; no network access.
    pub fn resolve_page(&self, url: &str, page: &FetchedPage) -> ResolutionResult {
        if let Some(header) = page.last_modified() {
            match parse_date_str(header) {
                Some(at) => return ResolutionResult::found(url, at, Method::HttpHeader, HEADER_SOURCE),
                None => tracing::debug!(url, header, "resolve.header_unparseable"),
            }
        }

        match self.chain.resolve(&page.body) {
            Some(found) => ResolutionResult::found(url, found.at, found.method, found.source),
            None => ResolutionResult::not_found(url),
        }
    }
}
