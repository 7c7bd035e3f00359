//! Page fetcher with browser-like headers, a hard timeout, and safe logging.
//!
//! - One GET per call, no retries; retry policy belongs to the caller
//! - Browser `User-Agent`, `Accept`, `Accept-Language`, `Connection: keep-alive`
//! - Failures are classified into [`FetchError`] (timeout / HTTP status / network)
//! - Bodies are read up to a byte cap and decoded lossily as UTF-8
//! - Optional *raw* request/response logging via `LASTMOD_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), lastmod_http::FetchError> {
//! use lastmod_http::{PageFetcher, PageSource};
//!
//! let fetcher = PageFetcher::new()?;
//! let page = fetcher.fetch("https://example.com/article").await?;
//! println!("{} -> {:?}", page.url, page.last_modified());
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), and final errors. Query
//! parameters that look like credentials are redacted before logging.

use async_trait::async_trait;
use lastmod_common::ErrorKind;
use lastmod_config::ResolverSettings;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderValue, LAST_MODIFIED,
    USER_AGENT,
};
use reqwest::Client;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

pub use reqwest::StatusCode;
pub use reqwest::header;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "LASTMOD_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), "-XGET".to_string()];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    let (host_path, query) = redact_query(url);
    let mut target = format!("{}://{}", url.scheme(), host_path);
    if !query.is_empty() {
        let q: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        target.push('?');
        target.push_str(&q.join("&"));
    }
    parts.push(format!("'{target}'"));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if matches!(
                key.to_ascii_lowercase().as_str(),
                "authorization" | "cookie" | "set-cookie"
            ) {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("client build failed: {0}")]
    Build(String),
    #[error("request timed out")]
    Timeout,
    #[error("server returned error {status}")]
    Http { status: StatusCode },
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Collapse into the serializable kind recorded on results.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUrl(m) => ErrorKind::InvalidUrl { message: m.clone() },
            FetchError::Build(m) | FetchError::Network(m) => {
                ErrorKind::Network { message: m.clone() }
            }
            FetchError::Timeout => ErrorKind::Timeout,
            FetchError::Http { status } => ErrorKind::Http {
                status: status.as_u16(),
            },
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        if err.is_builder() {
            return FetchError::InvalidUrl(error_chain(&err));
        }
        FetchError::Network(error_chain(&err))
    }
}

impl From<&FetchError> for ErrorKind {
    fn from(err: &FetchError) -> Self {
        err.kind()
    }
}

/// `reqwest` hides the interesting part (DNS, refused, TLS) in the source chain.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = err.to_string();
    let mut cur = err.source();
    while let Some(inner) = cur {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        cur = inner.source();
    }
    msg
}

// ==============================
// Page + source abstraction
// ==============================

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    /// Whether the body was cut at the configured byte cap.
    pub truncated: bool,
}

impl FetchedPage {
    /// A `200 OK` page with the given headers and body, for sources that do
    /// not go through [`PageFetcher`].
    pub fn ok(url: Url, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            url,
            status: StatusCode::OK,
            headers,
            body: body.into(),
            truncated: false,
        }
    }

    /// Raw `Last-Modified` header value, if present and non-empty.
    pub fn last_modified(&self) -> Option<&str> {
        self.headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Anything that can turn a candidate URL into a page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct PageFetcher {
    inner: Client,
    headers: HeaderMap,
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl PageFetcher {
    /// Construct a fetcher with the default settings.
    ///
    /// ```no_run
    /// use lastmod_http::{FetchError, PageFetcher};
    /// use std::time::Duration;
    ///
    /// let fetcher = PageFetcher::new()?;
    /// assert_eq!(fetcher.timeout, Duration::from_secs(10));
    /// # Ok::<(), FetchError>(())
    /// ```
    pub fn new() -> Result<Self, FetchError> {
        Self::from_settings(&ResolverSettings::default())
    }

    /// Build from loaded settings (timeout, user agent, language, body cap).
    pub fn from_settings(settings: &ResolverSettings) -> Result<Self, FetchError> {
        let timeout = settings.timeout();
        let inner = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;
        let headers = browser_headers(&settings.user_agent, &settings.accept_language)?;
        Ok(Self {
            inner,
            headers,
            timeout,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    /// Override the per-request timeout.
    ///
    /// ```no_run
    /// use lastmod_http::{FetchError, PageFetcher};
    /// use std::time::Duration;
    ///
    /// let fetcher = PageFetcher::new()?.with_timeout(Duration::from_secs(2));
    /// assert_eq!(fetcher.timeout, Duration::from_secs(2));
    /// # Ok::<(), FetchError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.timeout = dur;
        self
    }

    pub fn with_max_body_bytes(mut self, n: usize) -> Self {
        self.max_body_bytes = n;
        self
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    async fn fetch_page(&self, raw_url: &str) -> Result<FetchedPage, FetchError> {
        let url = parse_target(raw_url)?;

        // Lightweight request id without extra deps
        let req_id = format!(
            "r{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let (host_path, redacted_q) = redact_query(&url);

        tracing::debug!(
            req_id=%req_id,
            host_path=%host_path,
            query=?redacted_q,
            timeout_ms=self.timeout.as_millis() as u64,
            "http.request.start"
        );
        if raw_enabled() {
            let curl = make_curl(&url, &self.headers);
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let t0 = Instant::now();
        let resp = self
            .inner
            .get(url.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let err = FetchError::from_reqwest(e);
                tracing::warn!(req_id=%req_id, host_path=%host_path, error=%err, "http.network_error.send");
                err
            })?;

        let status = resp.status();
        let final_url = resp.url().clone();
        let headers = resp.headers().clone();

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=t0.elapsed().as_millis() as u64,
            final_url=%redact_query(&final_url).0,
            last_modified=?headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok()),
            content_type=?headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            "http.response.headers"
        );

        if !status.is_success() {
            tracing::warn!(req_id=%req_id, %status, host_path=%host_path, "http.error");
            return Err(FetchError::Http { status });
        }

        let (body, truncated) = if is_textual(&headers) {
            self.read_body(resp).await.map_err(|e| {
                tracing::warn!(req_id=%req_id, host_path=%host_path, error=%e, "http.network_error.body");
                e
            })?
        } else {
            tracing::debug!(req_id=%req_id, "http.response.skip_binary_body");
            (String::new(), false)
        };

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let mut text = body.clone();
            if text.len() > RAW_MAX_BODY {
                text.truncate(floor_char_boundary(&text, RAW_MAX_BODY));
            }
            tracing::info!(
                target: "http.raw",
                %req_id,
                status=%status,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }
        tracing::trace!(req_id=%req_id, body_snippet=%snip_body(&body), "http.response.body_snippet");

        Ok(FetchedPage {
            url: final_url,
            status,
            headers,
            body,
            truncated,
        })
    }

    async fn read_body(&self, mut resp: reqwest::Response) -> Result<(String, bool), FetchError> {
        let mut buf: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = resp.chunk().await.map_err(FetchError::from_reqwest)? {
            let room = self.max_body_bytes.saturating_sub(buf.len());
            if chunk.len() > room {
                buf.extend_from_slice(&chunk[..room]);
                drop_partial_char(&mut buf);
                truncated = true;
                break;
            }
            buf.extend_from_slice(&chunk);
        }
        Ok((String::from_utf8_lossy(&buf).into_owned(), truncated))
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch_page(url).await
    }
}

// ==============================
// Helpers
// ==============================

/// Headers that keep trivial bot filters from rejecting us outright.
pub fn browser_headers(user_agent: &str, accept_language: &str) -> Result<HeaderMap, FetchError> {
    let mut h = HeaderMap::new();
    let value = |raw: &str| {
        HeaderValue::from_str(raw.trim()).map_err(|e| FetchError::Build(format!("invalid header value: {e}")))
    };
    h.insert(USER_AGENT, value(user_agent)?);
    h.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    h.insert(ACCEPT_LANGUAGE, value(accept_language)?);
    h.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(h)
}

fn parse_target(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!(
            "{raw}: unsupported scheme `{other}`"
        ))),
    }
}

/// Missing content types are treated as text; images, PDFs and the like are not.
fn is_textual(headers: &HeaderMap) -> bool {
    let Some(ct) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return true;
    };
    let ct = ct.to_ascii_lowercase();
    ct.starts_with("text/") || ct.contains("html") || ct.contains("xml") || ct.contains("json")
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Drop a trailing UTF-8 sequence left incomplete by a byte cap.
fn drop_partial_char(buf: &mut Vec<u8>) {
    let len = buf.len();
    for back in 1..=len.min(4) {
        let b = buf[len - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let width = match b {
            0xF0.. => 4,
            0xE0.. => 3,
            0xC0.. => 2,
            _ => 1,
        };
        if width > back {
            buf.truncate(len - back);
        }
        return;
    }
}

fn snip_body(body: &str) -> String {
    let mut snip = body.to_string();
    if snip.len() > 500 {
        snip.truncate(floor_char_boundary(&snip, 500));
        snip.push_str("...");
    }
    snip
}

fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    // Return "host + path" string and redacted query list for logging
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = v.to_string();
            let is_secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token"
                    | "authorization"
                    | "auth"
                    | "key"
                    | "api_key"
                    | "token"
                    | "secret"
                    | "client_secret"
                    | "session"
                    | "sig"
            );
            (k, if is_secret { "<redacted>".into() } else { v })
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}
