//! Loader for resolver settings with YAML + environment overlays.
//!
//! Sources are merged in the order they are attached; `LASTMOD_`-prefixed
//! environment variables always win (e.g. `LASTMOD_TIMEOUT_SECS=5`,
//! `LASTMOD_LOG__FORMAT=json`). After merging, `${VAR}` placeholders inside
//! string values are expanded from the process environment.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const MAXIMUM_CONCURRENCY: usize = 16;
/// Longest accepted pause between queries (one hour).
pub const MAXIMUM_INTER_QUERY_DELAY_SECS: f64 = 3600.0;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything the resolver needs to know about how to fetch and pace requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Pause between consecutive URLs (and per-host spacing when concurrent).
    pub inter_query_delay_secs: f64,
    /// Upper bound on in-flight fetches; `1` keeps the sequential behavior.
    pub max_concurrency: usize,
    pub user_agent: String,
    pub accept_language: String,
    /// Response bodies are truncated to this many bytes before extraction.
    pub max_body_bytes: usize,
    pub log: LogSettings,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            inter_query_delay_secs: 2.0,
            max_concurrency: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            max_body_bytes: 5 * 1024 * 1024,
            log: LogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub dir: Option<PathBuf>,
    /// `text` or `json`.
    pub format: String,
    pub stderr: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: "text".to_string(),
            stderr: false,
        }
    }
}

impl ResolverSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn inter_query_delay(&self) -> Duration {
        // Out-of-range values never pass `validate`; clamp so unvalidated settings cannot panic.
        Duration::try_from_secs_f64(
            self.inter_query_delay_secs
                .clamp(0.0, MAXIMUM_INTER_QUERY_DELAY_SECS),
        )
        .unwrap_or_default()
    }

    /// Reject values that would make the resolver misbehave.
    ///
    /// ```
    /// use lastmod_config::ResolverSettings;
    ///
    /// let mut settings = ResolverSettings::default();
    /// assert!(settings.validate().is_ok());
    ///
    /// settings.max_concurrency = 0;
    /// assert!(settings.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Message("timeout_secs must be at least 1".into()));
        }
        if !(0.0..=MAXIMUM_INTER_QUERY_DELAY_SECS).contains(&self.inter_query_delay_secs) {
            return Err(ConfigError::Message(format!(
                "inter_query_delay_secs must be between 0 and {MAXIMUM_INTER_QUERY_DELAY_SECS}"
            )));
        }
        if self.max_concurrency == 0 || self.max_concurrency > MAXIMUM_CONCURRENCY {
            return Err(ConfigError::Message(format!(
                "max_concurrency must be between 1 and {MAXIMUM_CONCURRENCY}"
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Message("user_agent must not be empty".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Message("max_body_bytes must be positive".into()));
        }
        match self.log.format.to_ascii_lowercase().as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "log.format must be `text` or `json`, got `{other}`"
            ))),
        }
    }
}

/// `~/.config/lastmod/lastmod.yaml` (platform equivalent), if a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lastmod").join("lastmod.yaml"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct LastmodConfigLoader {
    files: Vec<(PathBuf, bool)>,
    snippets: Vec<String>,
}

impl Default for LastmodConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LastmodConfigLoader {
    /// Start with defaults overlaid by `LASTMOD_` env overrides.
    ///
    /// ```
    /// use lastmod_config::LastmodConfigLoader;
    ///
    /// let settings = LastmodConfigLoader::new()
    ///     .with_yaml_str("timeout_secs: 4\nmax_concurrency: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(settings.timeout_secs, 4);
    /// assert_eq!(settings.max_concurrency, 3);
    /// assert_eq!(settings.inter_query_delay_secs, 2.0);
    /// ```
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            snippets: Vec::new(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), true));
        self
    }

    /// Attach a file that is silently skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.snippets.push(yaml.to_string());
        self
    }

    /// Consume the builder, deserialize the merged sources and validate them.
    ///
    /// ```
    /// use lastmod_config::LastmodConfigLoader;
    ///
    /// let err = LastmodConfigLoader::new()
    ///     .with_yaml_str("timeout_secs: 0")
    ///     .load()
    ///     .unwrap_err();
    /// assert!(err.to_string().contains("timeout_secs"));
    /// ```
    pub fn load(self) -> Result<ResolverSettings, ConfigError> {
        let typed = self.load_unvalidated()?;
        typed.validate()?;
        Ok(typed)
    }

    /// Merge and deserialize without validating, for callers that still
    /// layer their own overrides (CLI flags) before calling
    /// [`ResolverSettings::validate`].
    ///
    /// ```
    /// use lastmod_config::LastmodConfigLoader;
    ///
    /// let mut settings = LastmodConfigLoader::new()
    ///     .with_yaml_str("timeout_secs: 0")
    ///     .load_unvalidated()
    ///     .expect("parses");
    /// assert!(settings.validate().is_err());
    /// settings.timeout_secs = 5;
    /// assert!(settings.validate().is_ok());
    /// ```
    pub fn load_unvalidated(self) -> Result<ResolverSettings, ConfigError> {
        let mut builder = Config::builder();
        for (path, required) in &self.files {
            builder = builder.add_source(File::from(path.as_path()).required(*required));
        }
        for yaml in &self.snippets {
            builder = builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        }
        builder = builder.add_source(
            Environment::with_prefix("LASTMOD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("LASTMOD_TEST_UA", Some("bot/1.0"), || {
            let mut v = json!("agent ${LASTMOD_TEST_UA} (compatible)");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("agent bot/1.0 (compatible)"));
        });
    }

    #[test]
    fn expands_nested_objects_and_leaves_numbers() {
        temp_env::with_var("LASTMOD_TEST_DIR", Some("/tmp/logs"), || {
            let mut v = json!({ "log": { "dir": "${LASTMOD_TEST_DIR}" }, "timeout_secs": 3 });
            expand_env_in_value(&mut v);
            assert_eq!(v, json!({ "log": { "dir": "/tmp/logs" }, "timeout_secs": 3 }));
        });
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("LASTMOD_A", Some("${LASTMOD_B}")), ("LASTMOD_B", Some("${LASTMOD_A}"))], || {
            let mut v = json!("x=${LASTMOD_A}");
            expand_env_in_value(&mut v);
            assert!(v.as_str().unwrap().contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${LASTMOD_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${LASTMOD_DOES_NOT_EXIST}"));
    }

    #[test]
    fn defaults_match_reference_behavior() {
        let s = ResolverSettings::default();
        assert_eq!(s.timeout(), Duration::from_secs(10));
        assert_eq!(s.inter_query_delay(), Duration::from_secs(2));
        assert_eq!(s.max_concurrency, 1);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut s = ResolverSettings::default();
        s.inter_query_delay_secs = -1.0;
        assert!(s.validate().is_err());

        let mut s = ResolverSettings::default();
        s.inter_query_delay_secs = f64::NAN;
        assert!(s.validate().is_err());

        let mut s = ResolverSettings::default();
        s.max_concurrency = MAXIMUM_CONCURRENCY + 1;
        assert!(s.validate().is_err());

        let mut s = ResolverSettings::default();
        s.user_agent = "   ".into();
        assert!(s.validate().is_err());

        let mut s = ResolverSettings::default();
        s.log.format = "xml".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn huge_delay_is_rejected_and_never_panics() {
        let mut s = ResolverSettings::default();
        s.inter_query_delay_secs = 1e20;
        assert!(s.validate().is_err());
        assert_eq!(
            s.inter_query_delay(),
            Duration::from_secs_f64(MAXIMUM_INTER_QUERY_DELAY_SECS)
        );

        s.inter_query_delay_secs = MAXIMUM_INTER_QUERY_DELAY_SECS;
        assert!(s.validate().is_ok());
    }
}
