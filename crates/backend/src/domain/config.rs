//! Configuration system for cloudscrape.
//!
//! Config priority: explicit path (`--config`) > user (~/.config/cloudscrape/config.toml) > defaults

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dirs;

/// Errors raised while loading an explicitly requested config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("Failed to serialize config: {0}")]
  Serialize(#[from] toml::ser::Error),
}

// ============================================================================
// Watcher Configuration
// ============================================================================

/// Timing and filtering settings for the directory watcher and its workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
  /// Interval between file size samples in milliseconds (default: 500)
  pub sample_interval_ms: u64,

  /// Consecutive unchanged non-zero samples required for stability (default: 3)
  pub stable_samples: u32,

  /// Upper bound on the stability wait in seconds (default: 30)
  pub max_wait_secs: u64,

  /// Extra delay after stability before the content check in milliseconds (default: 1000)
  pub settle_delay_ms: u64,

  /// Delay before the single parse retry in milliseconds (default: 1000)
  pub parse_retry_delay_ms: u64,

  /// How long stop() waits for outstanding workers in seconds (default: 5)
  pub stop_grace_secs: u64,

  /// Completion gate poll interval in milliseconds (default: 1000)
  pub completion_poll_ms: u64,

  /// Extension of files the external tool produces (default: "json")
  pub content_extension: String,

  /// Filenames containing this substring are skipped (default: "metadata")
  pub exclude_pattern: String,

  /// Capacity of the channel between notify's thread and the event loop (default: 256)
  pub event_buffer: usize,
}

impl Default for WatcherConfig {
  fn default() -> Self {
    Self {
      sample_interval_ms: 500,
      stable_samples: 3,
      max_wait_secs: 30,
      settle_delay_ms: 1000,
      parse_retry_delay_ms: 1000,
      stop_grace_secs: 5,
      completion_poll_ms: 1000,
      content_extension: "json".to_string(),
      exclude_pattern: "metadata".to_string(),
      event_buffer: 256,
    }
  }
}

impl WatcherConfig {
  pub fn sample_interval(&self) -> Duration {
    Duration::from_millis(self.sample_interval_ms)
  }

  pub fn max_wait(&self) -> Duration {
    Duration::from_secs(self.max_wait_secs)
  }

  pub fn settle_delay(&self) -> Duration {
    Duration::from_millis(self.settle_delay_ms)
  }

  pub fn parse_retry_delay(&self) -> Duration {
    Duration::from_millis(self.parse_retry_delay_ms)
  }

  pub fn stop_grace(&self) -> Duration {
    Duration::from_secs(self.stop_grace_secs)
  }

  pub fn completion_poll(&self) -> Duration {
    Duration::from_millis(self.completion_poll_ms)
  }

  /// Whether a path names a file the watcher should ingest
  ///
  /// Matches on the extension and rejects names containing the exclude pattern
  /// (sidecar files such as `scrape_metadata.json`).
  pub fn is_candidate(&self, path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
      return false;
    };

    let extension_matches = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext == self.content_extension);

    extension_matches && (self.exclude_pattern.is_empty() || !name.contains(&self.exclude_pattern))
  }
}

// ============================================================================
// Scrape Configuration
// ============================================================================

/// External tool and orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
  /// Enumeration tool executable (default: "aws-list-all")
  pub tool: String,

  /// Base directory holding scrapes/, logs/ and status/ (default: data dir/aws-inventory)
  pub base_dir: PathBuf,

  /// Hard limit on the tool's runtime in seconds (default: 3600)
  pub tool_timeout_secs: u64,

  /// How long to wait for ingestion after the tool exits in seconds (default: 120)
  pub completion_timeout_secs: u64,

  /// Profile passed to the tool when a scrape does not name one
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default_profile: Option<String>,
}

impl Default for ScrapeConfig {
  fn default() -> Self {
    Self {
      tool: "aws-list-all".to_string(),
      base_dir: dirs::data_dir().join("aws-inventory"),
      tool_timeout_secs: 3600,
      completion_timeout_secs: 120,
      default_profile: None,
    }
  }
}

impl ScrapeConfig {
  pub fn tool_timeout(&self) -> Duration {
    Duration::from_secs(self.tool_timeout_secs)
  }

  pub fn completion_timeout(&self) -> Duration {
    Duration::from_secs(self.completion_timeout_secs)
  }

  pub fn scrapes_dir(&self) -> PathBuf {
    self.base_dir.join("scrapes")
  }

  pub fn logs_dir(&self) -> PathBuf {
    self.base_dir.join("logs")
  }

  pub fn status_dir(&self) -> PathBuf {
    self.base_dir.join("status")
  }
}

// ============================================================================
// Store Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// LanceDB directory (default: data dir/lancedb)
  pub path: PathBuf,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      path: dirs::data_dir().join("lancedb"),
    }
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  pub level: String,

  /// Log file rotation: "daily", "hourly", "never"
  pub rotation: String,

  /// Write scrape logs to a rolling file instead of the console
  pub to_file: bool,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      rotation: "daily".to_string(),
      to_file: false,
    }
  }
}

// ============================================================================
// Top-level Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub watcher: WatcherConfig,

  #[serde(default)]
  pub scrape: ScrapeConfig,

  #[serde(default)]
  pub store: StoreConfig,

  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Config {
  /// Load configuration.
  ///
  /// An explicit path must exist and parse. Without one, the user config is
  /// used when present and valid, otherwise defaults.
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      return Self::load_from(path);
    }

    let user_config_path = Self::user_config_path();
    if user_config_path.exists() {
      match Self::load_from(&user_config_path) {
        Ok(config) => return Ok(config),
        Err(e) => warn!(error = %e, "Ignoring invalid user config, using defaults"),
      }
    }

    Ok(Self::default())
  }

  /// Load configuration from a specific file
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Get the user-level config path
  pub fn user_config_path() -> PathBuf {
    dirs::config_dir().join("config.toml")
  }

  /// Render the effective configuration as TOML
  pub fn to_toml(&self) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(self)?)
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();

    format!(
      r#"# cloudscrape configuration
# Place in ~/.config/cloudscrape/config.toml or pass --config <path>

# ============================================================================
# Directory watcher
# ============================================================================

[watcher]
# Interval between file size samples (ms)
sample_interval_ms = {sample_interval_ms}
# Unchanged non-zero samples required before a file counts as stable
stable_samples = {stable_samples}
# Give up on a file that has not stabilized after this many seconds
max_wait_secs = {max_wait_secs}
# Extra delay after stability before the content check (ms)
settle_delay_ms = {settle_delay_ms}
# Delay before retrying a failed parse once (ms)
parse_retry_delay_ms = {parse_retry_delay_ms}
# How long stopping the watcher waits for in-flight files (seconds)
stop_grace_secs = {stop_grace_secs}
# Completion gate poll interval (ms)
completion_poll_ms = {completion_poll_ms}
content_extension = "{content_extension}"
exclude_pattern = "{exclude_pattern}"

# ============================================================================
# Scrape orchestration
# ============================================================================

[scrape]
tool = "{tool}"
base_dir = '{base_dir}'
tool_timeout_secs = {tool_timeout_secs}
completion_timeout_secs = {completion_timeout_secs}
# default_profile = "default"

# ============================================================================
# Scan store
# ============================================================================

[store]
path = '{store_path}'

# ============================================================================
# Logging
# ============================================================================

[logging]
# off, error, warn, info, debug, trace (RUST_LOG overrides)
level = "{level}"
# daily, hourly, never
rotation = "{rotation}"
to_file = {to_file}
"#,
      sample_interval_ms = defaults.watcher.sample_interval_ms,
      stable_samples = defaults.watcher.stable_samples,
      max_wait_secs = defaults.watcher.max_wait_secs,
      settle_delay_ms = defaults.watcher.settle_delay_ms,
      parse_retry_delay_ms = defaults.watcher.parse_retry_delay_ms,
      stop_grace_secs = defaults.watcher.stop_grace_secs,
      completion_poll_ms = defaults.watcher.completion_poll_ms,
      content_extension = defaults.watcher.content_extension,
      exclude_pattern = defaults.watcher.exclude_pattern,
      tool = defaults.scrape.tool,
      base_dir = defaults.scrape.base_dir.display(),
      tool_timeout_secs = defaults.scrape.tool_timeout_secs,
      completion_timeout_secs = defaults.scrape.completion_timeout_secs,
      store_path = defaults.store.path.display(),
      level = defaults.logging.level,
      rotation = defaults.logging.rotation,
      to_file = defaults.logging.to_file,
    )
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_watcher_defaults() {
    let config = WatcherConfig::default();
    assert_eq!(config.sample_interval(), Duration::from_millis(500));
    assert_eq!(config.stable_samples, 3);
    assert_eq!(config.max_wait(), Duration::from_secs(30));
    assert_eq!(config.settle_delay(), Duration::from_secs(1));
    assert_eq!(config.parse_retry_delay(), Duration::from_secs(1));
    assert_eq!(config.stop_grace(), Duration::from_secs(5));
    assert_eq!(config.completion_poll(), Duration::from_secs(1));
  }

  #[test]
  fn test_is_candidate() {
    let config = WatcherConfig::default();
    assert!(config.is_candidate(Path::new("/out/ec2_DescribeInstances_us-east-1_None.json")));
    assert!(!config.is_candidate(Path::new("/out/scrape_metadata.json")));
    assert!(!config.is_candidate(Path::new("/out/ec2_DescribeInstances.json.tmp")));
    assert!(!config.is_candidate(Path::new("/out/README")));
  }

  #[test]
  fn test_is_candidate_ignores_directory_names() {
    let config = WatcherConfig::default();
    assert!(config.is_candidate(Path::new("/metadata/s3_ListBuckets.json")));
  }

  #[test]
  fn test_scrape_dirs() {
    let config = ScrapeConfig {
      base_dir: PathBuf::from("/inv"),
      ..Default::default()
    };
    assert_eq!(config.scrapes_dir(), PathBuf::from("/inv/scrapes"));
    assert_eq!(config.logs_dir(), PathBuf::from("/inv/logs"));
    assert_eq!(config.status_dir(), PathBuf::from("/inv/status"));
  }

  #[test]
  fn test_load_explicit_partial_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
      &path,
      r#"
[watcher]
sample_interval_ms = 100

[scrape]
tool = "/usr/local/bin/aws-list-all"
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.watcher.sample_interval_ms, 100);
    assert_eq!(config.watcher.stable_samples, 3, "unset fields keep defaults");
    assert_eq!(config.scrape.tool, "/usr/local/bin/aws-list-all");
    assert_eq!(config.logging.level, "info");
  }

  #[test]
  fn test_load_explicit_missing_file_errors() {
    let temp = TempDir::new().unwrap();
    let err = Config::load(Some(&temp.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
  }

  #[test]
  fn test_load_explicit_invalid_toml_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "[watcher\nsample_interval_ms = ").unwrap();
    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }

  #[test]
  fn test_generate_template_parses() {
    let template = Config::generate_template();
    let parsed: Config = toml::from_str(&template).expect("template should be valid TOML");
    assert_eq!(parsed.watcher, WatcherConfig::default());
    assert_eq!(parsed.scrape.tool, "aws-list-all");
  }

  #[test]
  fn test_toml_roundtrip() {
    let mut config = Config::default();
    config.watcher.max_wait_secs = 5;
    config.scrape.default_profile = Some("prod".to_string());

    let rendered = config.to_toml().unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.watcher.max_wait_secs, 5);
    assert_eq!(parsed.scrape.default_profile.as_deref(), Some("prod"));
  }
}
