//! Doc manager configuration.
//!
//! A [`DocManagerConfig`] can be built in code, loaded from a TOML/YAML/JSON
//! file, or derived from [`DocManagerOpts`] command-line options that an
//! orchestrator binary flattens into its own CLI.

mod duration;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub use duration::{format_duration, parse_duration};

/// Default name of the field identifying a document.
pub const DEFAULT_UNIQUE_KEY: &str = "_id";

/// Default period between two auto-commits.
pub const DEFAULT_AUTO_COMMIT_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration for a doc manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocManagerConfig {
    /// File path or `file://` URL to append to. `None`, empty or `-` means stdout.
    pub destination: Option<String>,

    /// Whether to flush the sink periodically in the background.
    pub auto_commit: bool,

    /// Field identifying a document across updates and removals.
    pub unique_key: String,

    /// Period of the background auto-commit.
    #[serde(with = "interval_serde")]
    pub auto_commit_interval: Duration,

    /// Whether `search` appends a query record to the sink.
    pub record_queries: bool,

    /// Backend-specific options. Accepted so configurations written for other
    /// backends load unchanged; this doc manager ignores them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for DocManagerConfig {
    fn default() -> Self {
        Self {
            destination: None,
            auto_commit: true,
            unique_key: DEFAULT_UNIQUE_KEY.to_string(),
            auto_commit_interval: DEFAULT_AUTO_COMMIT_INTERVAL,
            record_queries: true,
            extra: BTreeMap::new(),
        }
    }
}

impl DocManagerConfig {
    /// Create a config writing to `destination` with default values otherwise.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: Some(destination.into()),
            ..Self::default()
        }
    }

    /// Create a config writing to standard output.
    pub fn stdout() -> Self {
        Self::default()
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_unique_key(mut self, unique_key: impl Into<String>) -> Self {
        self.unique_key = unique_key.into();
        self
    }

    pub fn with_auto_commit_interval(mut self, interval: Duration) -> Self {
        self.auto_commit_interval = interval;
        self
    }

    pub fn with_record_queries(mut self, record_queries: bool) -> Self {
        self.record_queries = record_queries;
        self
    }

    /// Add a backend-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check the values a doc manager cannot work with.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.unique_key.is_empty() {
            return Err("unique_key must not be empty".to_string());
        }
        if self.auto_commit && self.auto_commit_interval.is_zero() {
            return Err("auto_commit_interval must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Load a config file, choosing the format from its extension
    /// (`.toml`, `.yaml`/`.yml` or `.json`).
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        let config: Self = match extension {
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML config: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config: {}", path.display()))?,
            other => anyhow::bail!("Unsupported config file extension: '{other}'"),
        };

        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("{reason} (in {})", path.display()))?;

        Ok(config)
    }
}

/// Command-line options for the doc manager.
#[derive(Parser, Clone, Debug)]
pub struct DocManagerOpts {
    /// File to append documents to (empty or '-' for stdout)
    #[arg(long, env = "DOC_MANAGER_DESTINATION")]
    pub destination: Option<String>,

    /// Disable the periodic background commit
    #[arg(long, env = "DOC_MANAGER_NO_AUTO_COMMIT")]
    pub no_auto_commit: bool,

    /// Field identifying a document across updates and removals
    #[arg(long, default_value = DEFAULT_UNIQUE_KEY, env = "DOC_MANAGER_UNIQUE_KEY")]
    pub unique_key: String,

    /// Period of the background commit (e.g. 500ms, 2s, 1m)
    #[arg(
        long,
        default_value = "1000ms",
        value_parser = parse_duration_arg,
        env = "DOC_MANAGER_AUTO_COMMIT_INTERVAL"
    )]
    pub auto_commit_interval: Duration,

    /// Do not record time-range queries in the sink
    #[arg(long)]
    pub no_record_queries: bool,

    /// Backend-specific option, accepted and ignored (format: KEY=VALUE)
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

fn parse_duration_arg(s: &str) -> std::result::Result<Duration, String> {
    parse_duration(s).map_err(|e| format!("{e:#}"))
}

impl TryFrom<&DocManagerOpts> for DocManagerConfig {
    type Error = anyhow::Error;

    fn try_from(opts: &DocManagerOpts) -> anyhow::Result<Self> {
        let mut extra = BTreeMap::new();
        for option in &opts.options {
            let (key, value) = option
                .split_once('=')
                .with_context(|| format!("Invalid option '{option}': expected KEY=VALUE"))?;
            extra.insert(
                key.trim().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }

        let config = Self {
            destination: opts.destination.clone(),
            auto_commit: !opts.no_auto_commit,
            unique_key: opts.unique_key.clone(),
            auto_commit_interval: opts.auto_commit_interval,
            record_queries: !opts.no_record_queries,
            extra,
        };
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }
}

/// (De)serializes an interval as `"<n>ms"`, accepting any duration string or
/// a bare integer of milliseconds on input.
mod interval_serde {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInterval {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match RawInterval::deserialize(deserializer)? {
            RawInterval::Millis(millis) => Ok(Duration::from_millis(millis)),
            RawInterval::Text(text) => {
                parse_duration(&text).map_err(|e| serde::de::Error::custom(format!("{e:#}")))
            }
        }
    }
}
