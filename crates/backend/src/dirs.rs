//! Data and config directory resolution.
//!
//! An explicit `CLOUDSCRAPE_*` override wins, then the XDG variable, then the
//! platform default from the `dirs` crate.

use std::path::PathBuf;

const APP_DIR: &str = "cloudscrape";

/// Base directory for scan output, the scan store, and logs
pub fn data_dir() -> PathBuf {
  resolve(
    std::env::var("CLOUDSCRAPE_DATA_DIR").ok(),
    std::env::var("XDG_DATA_HOME").ok(),
    dirs::data_local_dir(),
  )
}

/// Directory holding `config.toml`
pub fn config_dir() -> PathBuf {
  resolve(
    std::env::var("CLOUDSCRAPE_CONFIG_DIR").ok(),
    std::env::var("XDG_CONFIG_HOME").ok(),
    dirs::config_dir(),
  )
}

fn resolve(explicit: Option<String>, xdg: Option<String>, platform: Option<PathBuf>) -> PathBuf {
  let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

  if let Some(dir) = non_empty(explicit) {
    return PathBuf::from(dir);
  }
  if let Some(base) = non_empty(xdg) {
    return PathBuf::from(base).join(APP_DIR);
  }
  platform.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}
