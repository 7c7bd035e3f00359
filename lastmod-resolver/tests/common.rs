#![allow(dead_code)]

use std::sync::OnceLock;

use lastmod_common::observability::{LogConfig, LogFormat};
use lastmod_resolver::DateResolutionPipeline;
use lastmod_http::PageFetcher;
use std::sync::Arc;
use std::time::Duration;

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "lastmod-tests",
            log_dir: Some(std::env::temp_dir().join("lastmod-tests")),
            emit_stderr: true,
            format: if std::env::var("LASTMOD_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug",
        };

        lastmod_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// Real fetcher with a short timeout, for wiremock-backed tests.
pub fn http_pipeline(timeout: Duration) -> DateResolutionPipeline {
    let fetcher = PageFetcher::new()
        .expect("fetcher builds")
        .with_timeout(timeout);
    DateResolutionPipeline::new(Arc::new(fetcher))
}

pub fn article(head: &str, body: &str) -> String {
    format!("<!doctype html><html><head><title>t</title>{head}</head><body>{body}</body></html>")
}
