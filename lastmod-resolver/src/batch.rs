use crate::pipeline::DateResolutionPipeline;
use crate::throttle::{HostThrottle, host_key};
use futures::stream::{self, StreamExt};
use lastmod_common::{ErrorKind, LastmodError, ResolutionResult};
use lastmod_config::ResolverSettings;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Applies a [`DateResolutionPipeline`] to a list of URLs.
///
/// Output has exactly one result per input URL, in input order. With
/// `max_concurrency == 1` URLs are resolved one at a time with
/// `inter_query_delay` between them; above that, up to `max_concurrency`
/// fetches run at once and requests to the same host stay
/// `inter_query_delay` apart.
#[derive(Clone)]
pub struct BatchResolver {
    pipeline: DateResolutionPipeline,
    inter_query_delay: Duration,
    max_concurrency: usize,
}

impl BatchResolver {
    pub fn new(pipeline: DateResolutionPipeline) -> Self {
        Self {
            pipeline,
            inter_query_delay: Duration::from_secs(2),
            max_concurrency: 1,
        }
    }

    pub fn from_settings(settings: &ResolverSettings) -> Result<Self, LastmodError> {
        let pipeline = DateResolutionPipeline::from_settings(settings)?;
        Ok(Self::new(pipeline)
            .with_delay(settings.inter_query_delay())
            .with_max_concurrency(settings.max_concurrency))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_query_delay = delay;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn pipeline(&self) -> &DateResolutionPipeline {
        &self.pipeline
    }

    /// Resolve every URL; individual failures never abort the batch.
    pub async fn resolve_all<S: AsRef<str>>(&self, urls: &[S]) -> Vec<ResolutionResult> {
        self.resolve_all_until(urls, CancellationToken::new()).await
    }

    /// Like [`resolve_all`](Self::resolve_all), but stops when `cancel` fires.
    /// In-flight and not-yet-started URLs are then reported as timeouts.
    pub async fn resolve_all_until<S: AsRef<str>>(
        &self,
        urls: &[S],
        cancel: CancellationToken,
    ) -> Vec<ResolutionResult> {
        let started = Instant::now();
        tracing::info!(
            target: "batch",
            urls = urls.len(),
            max_concurrency = self.max_concurrency,
            delay_ms = self.inter_query_delay.as_millis() as u64,
            "batch.start"
        );

        let results = if self.max_concurrency <= 1 {
            self.run_sequential(urls, &cancel).await
        } else {
            self.run_concurrent(urls, &cancel).await
        };

        let found = results.iter().filter(|r| r.resolved_date.is_some()).count();
        let failed = results.iter().filter(|r| r.is_failure()).count();
        tracing::info!(
            target: "batch",
            urls = results.len(),
            found,
            failed,
            not_found = results.len() - found - failed,
            cancelled = cancel.is_cancelled(),
            duration_ms = started.elapsed().as_millis() as u64,
            "batch.done"
        );
        results
    }

    async fn run_sequential<S: AsRef<str>>(
        &self,
        urls: &[S],
        cancel: &CancellationToken,
    ) -> Vec<ResolutionResult> {
        let mut out = Vec::with_capacity(urls.len());
        for (idx, url) in urls.iter().enumerate() {
            let url = url.as_ref();
            if idx > 0 && !self.inter_query_delay.is_zero() {
                tokio::select! {
                    _ = sleep(self.inter_query_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            if cancel.is_cancelled() {
                out.push(ResolutionResult::failed(url, ErrorKind::Timeout));
                continue;
            }
            out.push(self.pipeline.resolve_until(url, cancel).await);
        }
        out
    }

    async fn run_concurrent<S: AsRef<str>>(
        &self,
        urls: &[S],
        cancel: &CancellationToken,
    ) -> Vec<ResolutionResult> {
        let throttle = HostThrottle::new(self.inter_query_delay);
        let throttle = &throttle;
        stream::iter(urls.iter().map(|u| u.as_ref()))
            .map(|url| async move {
                let key = host_key(url);
                tokio::select! {
                    _ = throttle.acquire(&key) => {}
                    _ = cancel.cancelled() => {}
                }
                if cancel.is_cancelled() {
                    return ResolutionResult::failed(url, ErrorKind::Timeout);
                }
                self.pipeline.resolve_until(url, cancel).await
            })
            .buffered(self.max_concurrency)
            .collect()
            .await
    }
}
