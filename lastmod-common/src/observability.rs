//! Logging bootstrap shared by the `lastmod` binary and integration tests.
//!
//! Every process writes to a daily-rolling file; stderr mirroring and the
//! JSON encoding are opt-in through [`LogSettings`]. The first successful
//! [`init_logging`] call wins; later calls just return the resolved path.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Local;
use lastmod_config::LogSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

const LOG_DIR_ENV: &str = "LASTMOD_LOG_DIR";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse `text`/`json` (case-insensitive); anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn layer<W>(self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
        match self {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

/// What [`init_logging`] sets up.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used for the file prefix and the default directory name.
    pub app_name: &'static str,
    /// `None` falls back to `LASTMOD_LOG_DIR`, then the platform data dir.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: &'static str,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_settings(&LogSettings::default())
    }
}

impl LogConfig {
    /// Map the `log` section of the resolver settings onto a logger config.
    /// Unknown formats fall back to text; `validate` already rejects them.
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self {
            app_name: "lastmod",
            log_dir: settings.dir.clone(),
            emit_stderr: settings.stderr,
            format: LogFormat::parse(&settings.format).unwrap_or(LogFormat::Text),
            default_filter: "info",
        }
    }

    fn file_prefix(&self) -> String {
        format!("{}.log", self.app_name)
    }

    fn resolved_dir(&self) -> PathBuf {
        let explicit = self
            .log_dir
            .clone()
            .or_else(|| std::env::var_os(LOG_DIR_ENV).map(PathBuf::from));
        match explicit {
            Some(dir) => expand_tilde(&dir),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(self.app_name),
        }
    }
}

/// Install the global subscriber and return today's log file path.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = config.resolved_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    // `rolling::daily` names files `<prefix>.<YYYY-MM-DD>`.
    let prefix = config.file_prefix();
    let today_file = dir.join(format!("{prefix}.{}", Local::now().format("%Y-%m-%d")));
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, &prefix));

    let mut layers: Vec<BoxedLayer> = vec![config.format.layer(file_writer, false)];
    if config.emit_stderr {
        layers.push(config.format.layer(std::io::stderr, true));
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_filter));

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let _ = LOG_GUARD.set(guard);
    let _ = LOG_PATH.set(today_file.clone());
    Ok(today_file)
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
        None => path.to_path_buf(),
    }
}
