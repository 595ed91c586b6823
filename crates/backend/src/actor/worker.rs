//! IngestWorker - turns one discovered file into one sink record
//!
//! Per path:
//! 1. Skip if the path is already processed
//! 2. Wait for the stability detector; abandon if not ready
//! 3. Parse the filename
//! 4. Read and parse the content, retrying once after a delay
//! 5. Submit to the sink; mark processed only on acceptance
//!
//! Failures are per file: they are logged and reported through
//! [`IngestOutcome`], never propagated to the watcher.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{registry::PathRegistry, sink::RecordSink};
use crate::{
  domain::{config::WatcherConfig, record::IngestedRecord},
  ingest::{NotReadyReason, Readiness, StabilityDetector, parse_filename, read_content},
};

/// How a single ingestion attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
  Ingested,
  AlreadyProcessed,
  Abandoned(NotReadyReason),
  ParseFailed,
  SinkRejected,
  /// The owning session was torn down before the record was submitted
  Cancelled,
}

pub struct IngestWorker {
  scan_id: Arc<str>,
  detector: StabilityDetector,
  parse_retry_delay: Duration,
  content_extension: String,
  registry: Arc<PathRegistry>,
  sink: Arc<dyn RecordSink>,
  teardown: CancellationToken,
}

impl IngestWorker {
  pub fn new(
    scan_id: &str,
    config: &WatcherConfig,
    registry: Arc<PathRegistry>,
    sink: Arc<dyn RecordSink>,
    teardown: CancellationToken,
  ) -> Self {
    Self {
      scan_id: Arc::from(scan_id),
      detector: StabilityDetector::new(config, teardown.clone()),
      parse_retry_delay: config.parse_retry_delay(),
      content_extension: config.content_extension.clone(),
      registry,
      sink,
      teardown,
    }
  }

  pub fn scan_id(&self) -> &str {
    &self.scan_id
  }

  /// Ingest `path` and release its in-flight claim
  pub async fn run(&self, path: PathBuf) -> IngestOutcome {
    let outcome = self.ingest(&path).await;
    self.registry.release(&path);
    debug!(path = %path.display(), outcome = ?outcome, "Ingestion finished");
    outcome
  }

  async fn ingest(&self, path: &Path) -> IngestOutcome {
    if self.registry.is_processed(path) {
      return IngestOutcome::AlreadyProcessed;
    }

    match self.detector.check(path).await {
      Readiness::Ready => {}
      Readiness::NotReady(NotReadyReason::Cancelled) => return IngestOutcome::Cancelled,
      Readiness::NotReady(reason) => {
        warn!(path = %path.display(), reason = %reason, "File not ready, abandoning");
        return IngestOutcome::Abandoned(reason);
      }
    }

    let filename = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let parsed = parse_filename(&filename, &self.content_extension);

    let payload = match self.read_with_retry(path).await {
      Ok(payload) => payload,
      Err(outcome) => return outcome,
    };

    if self.teardown.is_cancelled() {
      debug!(path = %path.display(), "Session torn down, skipping sink submission");
      return IngestOutcome::Cancelled;
    }

    let record = IngestedRecord::new(&self.scan_id, path, parsed, payload);
    // A store commit already in progress when teardown fires may still land
    let accepted = tokio::select! {
      biased;
      _ = self.teardown.cancelled() => {
        debug!(path = %path.display(), "Session torn down during sink submission");
        return IngestOutcome::Cancelled;
      }
      accepted = self.sink.insert(&record) => accepted,
    };
    if !accepted {
      warn!(
        path = %path.display(),
        scan_id = %self.scan_id,
        "Sink rejected record, file will not be counted"
      );
      return IngestOutcome::SinkRejected;
    }

    self.registry.mark_processed(path);
    info!(
      scan_id = %self.scan_id,
      service = %record.service,
      operation = %record.operation,
      file = %filename,
      "Ingested file"
    );
    IngestOutcome::Ingested
  }

  async fn read_with_retry(&self, path: &Path) -> Result<Value, IngestOutcome> {
    let first_error = match read_content(path).await {
      Ok(payload) => return Ok(payload),
      Err(e) => e,
    };
    warn!(path = %path.display(), error = %first_error, "Failed to read content, retrying once");

    tokio::select! {
      biased;
      _ = self.teardown.cancelled() => return Err(IngestOutcome::Cancelled),
      _ = tokio::time::sleep(self.parse_retry_delay) => {}
    }

    read_content(path).await.map_err(|e| {
      error!(path = %path.display(), error = %e, "Failed to parse content after retry");
      IngestOutcome::ParseFailed
    })
  }
}
