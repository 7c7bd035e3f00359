use anyhow::{Context, Result};
use std::io::{self, Read};
use std::path::Path;

/// URLs from the command line first, then from `--input` (`-` reads stdin).
pub fn collect_urls(args: &[String], input: Option<&Path>) -> Result<Vec<String>> {
    let mut urls: Vec<String> = args
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(path) = input {
        let text = if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading URLs from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("reading URL list {}", path.display()))?
        };
        urls.extend(parse_url_list(&text));
    }
    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are skipped.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
