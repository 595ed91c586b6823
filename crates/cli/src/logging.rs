//! Logging setup for one-shot commands and long-running scrapes

use cloudscrape::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "cloudscrape.log";

/// Parse log level from config string
fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Env filter with the configured default level (`RUST_LOG` wins)
fn env_filter(config: &LoggingConfig) -> EnvFilter {
  EnvFilter::builder()
    .with_default_directive(parse_log_level(&config.level).into())
    .from_env_lossy()
}

/// Initialize logging for short commands (console only, stderr)
pub fn init_cli_logging(config: &LoggingConfig) {
  tracing_subscriber::fmt()
    .with_env_filter(env_filter(config))
    .with_writer(std::io::stderr)
    .init();
}

/// Initialize logging for `scrape`.
///
/// With `--foreground`, or when file logging is off, logs go to the console.
/// Otherwise they go to a rolling file under `log_dir` and the returned guard
/// must be held until exit so buffered lines are flushed.
pub fn init_scrape_logging(config: &LoggingConfig, log_dir: &Path, foreground: bool) -> Option<WorkerGuard> {
  if foreground || !config.to_file {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter(config))
      .with_target(true)
      .with_ansi(true)
      .with_writer(std::io::stderr)
      .init();
    return None;
  }

  if std::fs::create_dir_all(log_dir).is_err() {
    // Fall back to console-only logging
    init_cli_logging(config);
    return None;
  }

  let file_appender = match config.rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(log_dir, LOG_FILE_NAME),
    "never" => tracing_appender::rolling::never(log_dir, LOG_FILE_NAME),
    _ => tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME),
  };

  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter(config))
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_log_level() {
    assert_eq!(parse_log_level("DEBUG"), tracing::Level::DEBUG);
    assert_eq!(parse_log_level("off"), tracing::Level::ERROR);
    assert_eq!(parse_log_level("verbose"), tracing::Level::INFO);
  }
}
