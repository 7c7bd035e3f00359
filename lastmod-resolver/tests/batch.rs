mod common;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::{article, http_pipeline, init_test_tracing};
use lastmod_common::{ErrorKind, Method};
use lastmod_http::header::{HeaderMap, HeaderValue, LAST_MODIFIED};
use lastmod_http::{FetchError, FetchedPage, PageSource, StatusCode};
use lastmod_resolver::{BatchResolver, DateResolutionPipeline};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory source: each URL maps to a latency and an outcome.
#[derive(Default)]
struct StubSource {
    routes: HashMap<String, (Duration, Result<String, StatusCode>)>,
    started: Mutex<Vec<(String, Instant)>>,
}

impl StubSource {
    fn page(mut self, url: &str, latency: Duration, last_modified: &str) -> Self {
        self.routes
            .insert(url.to_string(), (latency, Ok(last_modified.to_string())));
        self
    }

    fn status(mut self, url: &str, status: StatusCode) -> Self {
        self.routes
            .insert(url.to_string(), (Duration::ZERO, Err(status)));
        self
    }

    fn starts(&self) -> Vec<(String, Instant)> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for StubSource {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.started
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        let (latency, outcome) = self
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("no route for {url}")))?;
        tokio::time::sleep(latency).await;
        match outcome {
            Ok(last_modified) => {
                let mut headers = HeaderMap::new();
                headers.insert(LAST_MODIFIED, HeaderValue::from_str(&last_modified).unwrap());
                let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
                Ok(FetchedPage::ok(parsed, headers, "<html></html>"))
            }
            Err(status) => Err(FetchError::Http { status }),
        }
    }
}

fn batch_over(source: Arc<StubSource>) -> BatchResolver {
    BatchResolver::new(DateResolutionPipeline::new(source))
}

const DAY1: &str = "Mon, 01 Jan 2024 00:00:00 GMT";
const DAY2: &str = "Tue, 02 Jan 2024 00:00:00 GMT";
const DAY3: &str = "Wed, 03 Jan 2024 00:00:00 GMT";

#[tokio::test]
async fn empty_input_yields_empty_output() {
    init_test_tracing();
    let batch = batch_over(Arc::new(StubSource::default())).with_delay(Duration::ZERO);
    let urls: Vec<String> = Vec::new();
    assert!(batch.resolve_all(&urls).await.is_empty());
}

#[tokio::test]
async fn failure_in_the_middle_keeps_order_and_length() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(article("", "").into_bytes(), "text/html")
                .insert_header("Last-Modified", DAY1),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/three"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(article("", "").into_bytes(), "text/html")
                .insert_header("Last-Modified", DAY3),
        )
        .mount(&server)
        .await;

    let urls: Vec<String> = ["/one", "/two", "/three"]
        .iter()
        .map(|p| format!("{}{p}", server.uri()))
        .collect();
    let batch = BatchResolver::new(http_pipeline(Duration::from_secs(5))).with_delay(Duration::ZERO);
    let results = batch.resolve_all(&urls).await;

    assert_eq!(results.len(), 3);
    for (res, url) in results.iter().zip(&urls) {
        assert_eq!(&res.url, url);
    }
    assert_eq!(results[0].method, Some(Method::HttpHeader));
    assert_eq!(results[1].error, Some(ErrorKind::Http { status: 500 }));
    assert_eq!(results[1].resolved_date, None);
    assert_eq!(
        results[2].resolved_date,
        Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
    );
}

#[tokio::test(start_paused = true)]
async fn sequential_mode_waits_between_urls() {
    init_test_tracing();
    let source = Arc::new(
        StubSource::default()
            .page("https://a.test/1", Duration::ZERO, DAY1)
            .page("https://b.test/2", Duration::ZERO, DAY2)
            .page("https://c.test/3", Duration::ZERO, DAY3),
    );
    let batch = batch_over(source.clone()).with_delay(Duration::from_secs(2));

    let t0 = Instant::now();
    let results = batch
        .resolve_all(&["https://a.test/1", "https://b.test/2", "https://c.test/3"])
        .await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.resolved_date.is_some()));

    let starts = source.starts();
    assert_eq!(starts.len(), 3);
    assert_eq!(starts[0].1 - t0, Duration::ZERO);
    assert!(starts[1].1 - starts[0].1 >= Duration::from_secs(2));
    assert!(starts[2].1 - starts[1].1 >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn concurrent_mode_preserves_input_order() {
    init_test_tracing();
    let source = Arc::new(
        StubSource::default()
            .page("https://a.test/slow", Duration::from_secs(3), DAY1)
            .page("https://b.test/mid", Duration::from_secs(2), DAY2)
            .page("https://c.test/fast", Duration::from_secs(1), DAY3),
    );
    let batch = batch_over(source.clone())
        .with_delay(Duration::from_secs(2))
        .with_max_concurrency(3);

    let t0 = Instant::now();
    let urls = ["https://a.test/slow", "https://b.test/mid", "https://c.test/fast"];
    let results = batch.resolve_all(&urls).await;

    let got: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(got, urls);
    assert_eq!(
        results[0].resolved_date,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        results[2].resolved_date,
        Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
    );
    // Distinct hosts run side by side.
    assert!(t0.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn concurrent_mode_spaces_requests_to_the_same_host() {
    init_test_tracing();
    let source = Arc::new(
        StubSource::default()
            .page("https://same.test/a", Duration::ZERO, DAY1)
            .page("https://same.test/b", Duration::ZERO, DAY2)
            .page("https://other.test/c", Duration::ZERO, DAY3),
    );
    let batch = batch_over(source.clone())
        .with_delay(Duration::from_secs(2))
        .with_max_concurrency(3);

    let t0 = Instant::now();
    batch
        .resolve_all(&["https://same.test/a", "https://same.test/b", "https://other.test/c"])
        .await;

    let starts: HashMap<String, Instant> = source.starts().into_iter().collect();
    let a = starts["https://same.test/a"];
    let b = starts["https://same.test/b"];
    let c = starts["https://other.test/c"];
    assert!(b - a >= Duration::from_secs(2));
    assert_eq!(c - t0, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn cancellation_marks_remaining_urls_as_timeouts() {
    init_test_tracing();
    let source = Arc::new(
        StubSource::default()
            .page("https://a.test/1", Duration::ZERO, DAY1)
            .page("https://b.test/2", Duration::from_secs(60), DAY2)
            .page("https://c.test/3", Duration::ZERO, DAY3),
    );
    let batch = batch_over(source.clone()).with_delay(Duration::from_secs(1));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let t0 = Instant::now();
    let results = batch
        .resolve_all_until(&["https://a.test/1", "https://b.test/2", "https://c.test/3"], cancel)
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].method, Some(Method::HttpHeader));
    assert_eq!(results[1].error, Some(ErrorKind::Timeout));
    assert_eq!(results[2].error, Some(ErrorKind::Timeout));
    assert!(t0.elapsed() < Duration::from_secs(10));
    // The third URL was never fetched.
    assert_eq!(source.starts().len(), 2);
}

#[tokio::test]
async fn stub_status_errors_are_recorded() {
    init_test_tracing();
    let source = Arc::new(
        StubSource::default()
            .page("https://a.test/ok", Duration::ZERO, DAY1)
            .status("https://a.test/forbidden", StatusCode::FORBIDDEN),
    );
    let results = batch_over(source)
        .with_delay(Duration::ZERO)
        .resolve_all(&["https://a.test/forbidden", "https://a.test/ok", "https://a.test/missing"])
        .await;

    assert_eq!(results[0].error, Some(ErrorKind::Http { status: 403 }));
    assert!(results[1].resolved_date.is_some());
    assert!(matches!(results[2].error, Some(ErrorKind::Network { .. })));
}
