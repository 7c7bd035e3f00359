//! Common types and utilities shared across lastmod crates.
//!
//! This crate defines the resolution data model, observability helpers, and
//! shared error types used throughout the lastmod workspace. It is kept
//! dependency-light so every crate can depend on it.
//!
//! # Overview
//!
//! - [`ResolutionResult`]: the per-URL outcome handed back to callers
//! - [`Method`]: which strategy produced a date
//! - [`ErrorKind`]: why a URL could not be fetched
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`LastmodError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use lastmod_common::{Method, ResolutionResult};
//!
//! let at = Utc.with_ymd_and_hms(2023, 8, 15, 10, 0, 0).unwrap();
//! let found = ResolutionResult::found("https://example.com", at, Method::HttpHeader, "http-header");
//! assert!(found.error.is_none());
//! assert_eq!(found.method, Some(Method::HttpHeader));
//!
//! let missing = ResolutionResult::not_found("https://example.com");
//! assert!(missing.resolved_date.is_none() && missing.error.is_none());
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;

/// The extraction strategy that produced a resolved date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    HttpHeader,
    JsonLd,
    Meta,
    Pattern,
    TimeTag,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::HttpHeader => "http-header",
            Method::JsonLd => "json-ld",
            Method::Meta => "meta",
            Method::Pattern => "pattern",
            Method::TimeTag => "time-tag",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch-level failure recorded on a [`ResolutionResult`].
///
/// Date parse failures never show up here; they are absorbed by the
/// extractors and only ever mean "try the next strategy".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request exceeded its deadline or was cancelled by the caller.
    Timeout,
    /// The server answered with a non-success status.
    Http { status: u16 },
    /// Connection, DNS, TLS or body transfer failure.
    Network { message: String },
    /// The candidate URL could not be used for an HTTP request.
    InvalidUrl { message: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => f.write_str("request timed out"),
            ErrorKind::Http { status } => write!(f, "server returned HTTP {status}"),
            ErrorKind::Network { message } => write!(f, "network error: {message}"),
            ErrorKind::InvalidUrl { message } => write!(f, "invalid URL: {message}"),
        }
    }
}

/// Outcome of resolving one candidate URL.
///
/// Exactly one of three shapes is produced:
/// - found: `resolved_date`, `method` and `source` are set
/// - not found: everything but `url` is `None`
/// - failed: only `error` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub url: String,
    pub resolved_date: Option<DateTime<Utc>>,
    pub method: Option<Method>,
    /// Finer-grained origin, e.g. `meta:article:modified_time`.
    pub source: Option<String>,
    pub error: Option<ErrorKind>,
}

impl ResolutionResult {
    pub fn found(
        url: impl Into<String>,
        at: DateTime<Utc>,
        method: Method,
        source: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            resolved_date: Some(at),
            method: Some(method),
            source: Some(source.into()),
            error: None,
        }
    }

    pub fn not_found(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resolved_date: None,
            method: None,
            source: None,
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: ErrorKind) -> Self {
        Self {
            url: url.into(),
            resolved_date: None,
            method: None,
            source: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Error types used across the lastmod system.
#[derive(thiserror::Error, Debug)]
pub enum LastmodError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Convenient alias for results that use [`LastmodError`].
pub type Result<T> = std::result::Result<T, LastmodError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn method_serializes_as_kebab_case() {
        let v = serde_json::to_value(Method::HttpHeader).unwrap();
        assert_eq!(v, serde_json::json!("http-header"));
        assert_eq!(Method::TimeTag.to_string(), "time-tag");
    }

    #[test]
    fn found_result_serializes_utc_with_z() {
        let at = Utc.with_ymd_and_hms(2023, 8, 15, 10, 0, 0).unwrap();
        let r = ResolutionResult::found("https://a.test/", at, Method::JsonLd, "json-ld:dateModified");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["resolved_date"], "2023-08-15T10:00:00Z");
        assert_eq!(v["method"], "json-ld");
        assert!(v["error"].is_null());
    }

    #[test]
    fn failed_result_carries_tagged_error() {
        let r = ResolutionResult::failed("https://a.test/", ErrorKind::Http { status: 404 });
        assert!(r.is_failure());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["error"]["kind"], "http");
        assert_eq!(v["error"]["status"], 404);
        assert!(v["resolved_date"].is_null());
    }

    #[test]
    fn error_kind_display_is_human_readable() {
        assert_eq!(ErrorKind::Timeout.to_string(), "request timed out");
        assert_eq!(
            ErrorKind::Http { status: 503 }.to_string(),
            "server returned HTTP 503"
        );
    }
}
