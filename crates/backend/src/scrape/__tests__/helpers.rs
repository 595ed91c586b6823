//! Test helpers for end-to-end scrape tests.
//!
//! `ScrapeTestContext` owns a temporary base directory, a scan store inside
//! it, and a fake enumeration tool written as a shell script.

use std::{path::PathBuf, sync::Arc};

use tempfile::TempDir;

use crate::{
  db::ScanDb,
  domain::config::{Config, WatcherConfig},
  scrape::Orchestrator,
};

pub struct ScrapeTestContext {
  pub base: TempDir,
  pub db: Arc<ScanDb>,
  pub config: Config,
}

impl ScrapeTestContext {
  pub async fn new() -> Self {
    let base = TempDir::new().expect("create base temp dir");
    let db = Arc::new(
      ScanDb::open(&base.path().join("lancedb"))
        .await
        .expect("open scan store"),
    );

    let mut config = Config::default();
    config.scrape.base_dir = base.path().join("inventory");
    config.scrape.tool_timeout_secs = 10;
    config.scrape.completion_timeout_secs = 10;
    config.store.path = base.path().join("lancedb");
    config.watcher = WatcherConfig {
      sample_interval_ms: 50,
      stable_samples: 3,
      max_wait_secs: 3,
      settle_delay_ms: 50,
      parse_retry_delay_ms: 100,
      stop_grace_secs: 2,
      completion_poll_ms: 50,
      ..Default::default()
    };

    Self { base, db, config }
  }

  /// Install a fake tool whose body runs with `$dir` set to the `--directory` argument
  #[cfg(unix)]
  pub fn install_tool(&mut self, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
      r#"#!/bin/sh
dir=""
while [ $# -gt 0 ]; do
  case "$1" in
    --directory) dir="$2"; shift 2 ;;
    *) shift ;;
  esac
done
{body}
"#
    );

    let path = self.base.path().join("fake-tool.sh");
    std::fs::write(&path, script).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod fake tool");
    self.config.scrape.tool = path.to_string_lossy().into_owned();
    path
  }

  pub fn orchestrator(&self) -> Orchestrator {
    Orchestrator::new(self.config.clone(), Arc::clone(&self.db))
  }
}
