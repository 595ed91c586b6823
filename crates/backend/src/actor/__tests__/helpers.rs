//! Test helpers for watcher integration tests.
//!
//! Provides an in-memory [`RecordSink`], a watcher config with short timings,
//! and `WatcherTestContext` which owns the temporary output directory.

use std::{
  path::{Path, PathBuf},
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::{
  actor::{sink::RecordSink, watcher::DirectoryWatcher},
  domain::{config::WatcherConfig, record::IngestedRecord},
};

/// Records every insert; optionally rejects them all or stalls before storing
#[derive(Debug, Default)]
pub struct MemorySink {
  records: Mutex<Vec<IngestedRecord>>,
  calls: AtomicUsize,
  reject: AtomicBool,
  delay: Duration,
}

impl MemorySink {
  pub fn rejecting() -> Self {
    let sink = Self::default();
    sink.reject.store(true, Ordering::SeqCst);
    sink
  }

  /// Each insert waits `delay` before the record is stored
  pub fn stalling(delay: Duration) -> Self {
    Self {
      delay,
      ..Default::default()
    }
  }

  pub fn records(&self) -> Vec<IngestedRecord> {
    self.records.lock().unwrap().clone()
  }

  pub fn insert_calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn records_for(&self, path: &Path) -> usize {
    self.records.lock().unwrap().iter().filter(|r| r.file_path == path).count()
  }
}

#[async_trait]
impl RecordSink for MemorySink {
  async fn insert(&self, record: &IngestedRecord) -> bool {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    if self.reject.load(Ordering::SeqCst) {
      return false;
    }
    self.records.lock().unwrap().push(record.clone());
    true
  }
}

/// Stability timings scaled down so a settled file is ready in ~250ms
pub fn fast_config() -> WatcherConfig {
  WatcherConfig {
    sample_interval_ms: 50,
    stable_samples: 3,
    max_wait_secs: 3,
    settle_delay_ms: 50,
    parse_retry_delay_ms: 100,
    stop_grace_secs: 2,
    completion_poll_ms: 50,
    ..Default::default()
  }
}

/// Test context for watcher integration tests.
pub struct WatcherTestContext {
  /// Directory the watcher observes
  pub output_dir: TempDir,
  pub sink: Arc<MemorySink>,
  pub watcher: DirectoryWatcher,
}

impl WatcherTestContext {
  pub fn new() -> Self {
    Self::with_sink(MemorySink::default(), fast_config())
  }

  pub fn with_sink(sink: MemorySink, config: WatcherConfig) -> Self {
    let output_dir = TempDir::new().expect("create output temp dir");
    let sink = Arc::new(sink);
    let watcher = DirectoryWatcher::new(config, sink.clone());

    Self {
      output_dir,
      sink,
      watcher,
    }
  }

  pub fn dir(&self) -> &Path {
    self.output_dir.path()
  }

  /// Start watching the output directory and give notify time to subscribe
  pub async fn start(&mut self, scan_id: &str) {
    let dir = self.output_dir.path().to_path_buf();
    self.watcher.start(&dir, scan_id).await.expect("start watcher");
    tokio::time::sleep(Duration::from_millis(100)).await;
  }

  /// Poll until the sink has seen at least `calls` inserts
  pub async fn wait_for_insert_calls(&self, calls: usize, limit: Duration) -> bool {
    tokio::time::timeout(limit, async {
      while self.sink.insert_calls() < calls {
        tokio::time::sleep(Duration::from_millis(20)).await;
      }
    })
    .await
    .is_ok()
  }

  /// Write a file in one shot
  pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
    let path = self.output_dir.path().join(name);
    std::fs::write(&path, content).expect("write file");
    path
  }
}
