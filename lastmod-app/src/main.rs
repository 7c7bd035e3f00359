use anyhow::{Context, Result, bail};
use clap::Parser;
use lastmod_common::observability::{LogConfig, init_logging};
use lastmod_config::{
    LastmodConfigLoader, MAXIMUM_INTER_QUERY_DELAY_SECS, ResolverSettings, default_config_path,
};
use lastmod_resolver::BatchResolver;
use output::OutputFormat;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod input;
mod output;

/// Best-effort "last updated" dates for a list of web pages.
#[derive(Debug, Parser)]
#[command(name = "lastmod", version)]
struct Cli {
    /// Candidate URLs, resolved in the order given.
    urls: Vec<String>,

    /// Read more URLs from a file, one per line (`-` for stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// YAML settings file (defaults to the user config dir, if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Seconds to wait between URLs (per host when concurrent).
    #[arg(long, value_parser = parse_delay)]
    delay: Option<f64>,

    /// Maximum number of fetches in flight.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Give up on the whole batch after this many seconds.
    #[arg(long, value_parser = parse_deadline)]
    deadline: Option<Duration>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Newest first; unresolved URLs go last.
    #[arg(long)]
    sort_by_date: bool,

    /// Mirror logs to stderr.
    #[arg(long)]
    log_stderr: bool,
}

fn parse_seconds(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw.trim().parse().map_err(|e| format!("{raw}: {e}"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("{raw}: expected a non-negative number of seconds"));
    }
    Ok(secs)
}

fn parse_delay(raw: &str) -> Result<f64, String> {
    let secs = parse_seconds(raw)?;
    if secs > MAXIMUM_INTER_QUERY_DELAY_SECS {
        return Err(format!(
            "{raw}: delay may not exceed {MAXIMUM_INTER_QUERY_DELAY_SECS} seconds"
        ));
    }
    Ok(secs)
}

fn parse_deadline(raw: &str) -> Result<Duration, String> {
    let secs = parse_seconds(raw)?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{raw}: {e}"))
}

fn load_settings(cli: &Cli) -> Result<ResolverSettings> {
    let loader = match (&cli.config, default_config_path()) {
        (Some(path), _) => LastmodConfigLoader::new().with_file(path),
        (None, Some(path)) => LastmodConfigLoader::new().with_optional_file(path),
        (None, None) => LastmodConfigLoader::new(),
    };
    // Flags are layered on before validation so they can repair a bad file value.
    let mut settings = loader.load_unvalidated().context("loading settings")?;

    if let Some(secs) = cli.timeout {
        settings.timeout_secs = secs;
    }
    if let Some(secs) = cli.delay {
        settings.inter_query_delay_secs = secs;
    }
    if let Some(n) = cli.concurrency {
        settings.max_concurrency = n;
    }
    if cli.log_stderr {
        settings.log.stderr = true;
    }
    settings.validate().context("invalid settings")?;
    Ok(settings)
}

fn spawn_cancel_triggers(cancel: &CancellationToken, deadline: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; remaining URLs will be reported as timeouts");
            on_signal.cancel();
        }
    });

    if let Some(deadline) = deadline {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "batch deadline reached");
            on_deadline.cancel();
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let log_path = init_logging(LogConfig::from_settings(&settings.log))?;
    tracing::debug!(log = %log_path.display(), ?settings, "lastmod.start");

    let urls = input::collect_urls(&cli.urls, cli.input.as_deref())?;
    if urls.is_empty() {
        bail!("no URLs given; pass them as arguments or with --input");
    }

    let batch = BatchResolver::from_settings(&settings)?;
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, cli.deadline);

    let mut results = batch.resolve_all_until(&urls, cancel).await;

    for r in &results {
        if let Some(err) = &r.error {
            eprintln!("warning: {}: {err}", r.url);
        }
    }

    if cli.sort_by_date {
        output::sort_newest_first(&mut results);
    }
    let mut stdout = std::io::stdout().lock();
    output::render(&results, cli.format, &mut stdout)
}
