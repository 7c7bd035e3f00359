use anyhow::Result;
use chrono::SecondsFormat;
use clap::ValueEnum;
use lastmod_common::ResolutionResult;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns: date, method, URL.
    Table,
    /// Pretty-printed JSON array of results.
    Json,
}

/// Newest first; unresolved URLs keep their relative order at the end.
pub fn sort_newest_first(results: &mut [ResolutionResult]) {
    results.sort_by(|a, b| b.resolved_date.cmp(&a.resolved_date));
}

pub fn render<W: Write>(results: &[ResolutionResult], format: OutputFormat, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Table => render_table(results, out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, results)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn render_table<W: Write>(results: &[ResolutionResult], out: &mut W) -> Result<()> {
    writeln!(out, "{:<20}  {:<11}  URL", "DATE", "METHOD")?;
    for r in results {
        let date = r
            .resolved_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "-".to_string());
        let method = r.method.map(|m| m.as_str()).unwrap_or("-");
        match &r.error {
            Some(err) => writeln!(out, "{date:<20}  {method:<11}  {}  ({err})", r.url)?,
            None => writeln!(out, "{date:<20}  {method:<11}  {}", r.url)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lastmod_common::{ErrorKind, Method};

    fn sample() -> Vec<ResolutionResult> {
        vec![
            ResolutionResult::not_found("https://a.test/none"),
            ResolutionResult::found(
                "https://b.test/old",
                Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
                Method::Meta,
                "meta:article:published_time",
            ),
            ResolutionResult::failed("https://c.test/down", ErrorKind::Http { status: 503 }),
            ResolutionResult::found(
                "https://d.test/new",
                Utc.with_ymd_and_hms(2023, 8, 15, 10, 0, 0).unwrap(),
                Method::HttpHeader,
                "http-header",
            ),
        ]
    }

    #[test]
    fn sorting_puts_unresolved_last_in_input_order() {
        let mut results = sample();
        sort_newest_first(&mut results);
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://d.test/new",
                "https://b.test/old",
                "https://a.test/none",
                "https://c.test/down",
            ]
        );
    }

    #[test]
    fn table_rows_show_date_method_and_error() {
        let mut buf = Vec::new();
        render(&sample(), OutputFormat::Table, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("DATE"));
        assert!(lines[1].starts_with("-"));
        assert!(lines[1].ends_with("https://a.test/none"));
        assert!(lines[2].starts_with("2021-01-01T00:00:00Z  meta"));
        assert!(lines[3].ends_with("(server returned HTTP 503)"));
        assert!(lines[4].contains("http-header"));
    }

    #[test]
    fn json_output_uses_utc_timestamps() {
        let mut buf = Vec::new();
        render(&sample(), OutputFormat::Json, &mut buf).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3]["resolved_date"], "2023-08-15T10:00:00Z");
        assert_eq!(rows[3]["method"], "http-header");
        assert_eq!(rows[0]["resolved_date"], serde_json::Value::Null);
        assert_eq!(rows[2]["error"]["kind"], "http");
        assert_eq!(rows[2]["error"]["status"], 503);
    }
}
