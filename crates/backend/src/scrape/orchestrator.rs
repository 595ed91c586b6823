//! Orchestrator - one end-to-end scan: run the tool, ingest while it writes, record the outcome
//!
//! # Flow
//!
//! ```text
//! create dirs → persist session (running) → start watcher → run tool
//!     → count produced files → wait for ingestion → stop watcher
//!     → decide outcome → write metadata → update session
//! ```
//!
//! The watcher never touches the session; only its processed count feeds
//! into the final record.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{
  FAIL_MARKER, METADATA_FILE, SUCCESS_MARKER, ScrapeError, ScrapeRequest,
  command::{ToolOutcome, build_command, run_tool},
  details::{ScanDetails, list_scanned_files, read_log},
};
use crate::{
  actor::DirectoryWatcher,
  db::ScanDb,
  domain::{
    config::Config,
    scan::{ScanOutcome, ScanSession, generate_scan_id},
  },
};

pub struct Orchestrator {
  config: Config,
  db: Arc<ScanDb>,
}

impl Orchestrator {
  pub fn new(config: Config, db: Arc<ScanDb>) -> Self {
    Self { config, db }
  }

  pub fn db(&self) -> &ScanDb {
    &self.db
  }

  /// Run one scan to completion and return the final session
  pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScanSession, ScrapeError> {
    let scan_id = generate_scan_id();
    let scrape_config = &self.config.scrape;

    let scan_dir = scrape_config.scrapes_dir().join(&scan_id);
    let log_dir = scrape_config.logs_dir().join(&scan_id);
    tokio::fs::create_dir_all(&scan_dir).await?;
    tokio::fs::create_dir_all(&log_dir).await?;

    let mut session = ScanSession::new(scan_id.clone(), scan_dir.clone(), log_dir.clone());
    session.command = build_command(
      &scrape_config.tool,
      &scan_dir,
      request,
      scrape_config.default_profile.as_deref(),
    );
    session.services = (!request.services.is_empty()).then(|| request.services.clone());
    session.regions = (!request.regions.is_empty()).then(|| request.regions.clone());
    session.profile = request
      .profile
      .clone()
      .or_else(|| scrape_config.default_profile.clone());

    self.db.add_scan(&session).await?;
    info!(scan_id = %scan_id, directory = %scan_dir.display(), "Starting scrape");

    match self.run_session(&mut session).await {
      Ok(()) => Ok(session),
      Err(e) => {
        self.record_failure(&mut session, &e).await;
        Err(e)
      }
    }
  }

  /// Watch, run the tool, settle ingestion, and persist the final outcome
  async fn run_session(&self, session: &mut ScanSession) -> Result<(), ScrapeError> {
    let scrape_config = &self.config.scrape;
    let scan_id = session.id.clone();

    let mut watcher = DirectoryWatcher::new(self.config.watcher.clone(), self.db.clone());
    watcher.start(&session.directory, &scan_id).await?;

    let tool = run_tool(&session.command, &session.log_directory, scrape_config.tool_timeout()).await;
    session.return_code = tool.return_code();

    let expected = match self.count_produced_files(&session.directory).await {
      Ok(expected) => expected,
      Err(e) => {
        watcher.stop().await;
        session.processed_files = watcher.processed_count() as u64;
        return Err(e);
      }
    };
    session.expected_files = expected as u64;

    let complete = if expected == 0 {
      debug!(scan_id = %scan_id, "No files produced, skipping completion wait");
      true
    } else {
      info!(scan_id = %scan_id, expected, "Waiting for ingestion to finish");
      watcher
        .wait_for_completion(expected, scrape_config.completion_timeout())
        .await
    };

    watcher.stop().await;
    let processed = watcher.processed_count();
    session.processed_files = processed as u64;

    let (outcome, error) = decide_outcome(&tool, complete, expected, processed);
    session.error = error;
    session.finish(outcome);

    self.write_metadata(session).await?;
    self.db.update_scan(session).await?;

    info!(
      scan_id = %scan_id,
      outcome = %session.outcome,
      expected,
      processed,
      duration_secs = session.duration_seconds().unwrap_or_default(),
      "Scrape finished"
    );

    Ok(())
  }

  /// Best-effort persistence of a scan that could not run to completion
  async fn record_failure(&self, session: &mut ScanSession, cause: &ScrapeError) {
    error!(scan_id = %session.id, err = %cause, "Scrape aborted");
    session.error = Some(cause.to_string());
    session.finish(ScanOutcome::Failure);

    if let Err(e) = self.write_status(session).await {
      warn!(scan_id = %session.id, err = %e, "Failed to write status marker for aborted scan");
    }
    if let Err(e) = self.db.update_scan(session).await {
      error!(scan_id = %session.id, err = %e, "Failed to record aborted scan");
    }
  }

  /// Candidate files directly inside the output directory
  async fn count_produced_files(&self, dir: &Path) -> Result<usize, ScrapeError> {
    let mut count = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if entry.file_type().await?.is_file() && self.config.watcher.is_candidate(&path) {
        count += 1;
      }
    }
    Ok(count)
  }

  async fn write_metadata(&self, session: &ScanSession) -> Result<(), ScrapeError> {
    let json = serde_json::to_string_pretty(session)?;
    tokio::fs::write(session.directory.join(METADATA_FILE), &json).await?;
    self.write_status(session).await
  }

  /// `status/<id>/metadata.json` plus an empty `success` or `fail` marker
  async fn write_status(&self, session: &ScanSession) -> Result<(), ScrapeError> {
    let status_dir = self.config.scrape.status_dir().join(&session.id);
    tokio::fs::create_dir_all(&status_dir).await?;
    tokio::fs::write(status_dir.join("metadata.json"), serde_json::to_string_pretty(session)?).await?;

    let (marker, stale) = if session.outcome.is_success() {
      (SUCCESS_MARKER, FAIL_MARKER)
    } else {
      (FAIL_MARKER, SUCCESS_MARKER)
    };
    tokio::fs::write(status_dir.join(marker), b"").await?;
    remove_file_if_exists(&status_dir.join(stale)).await?;
    Ok(())
  }

  /// A stored session plus its files and captured logs
  pub async fn scan_details(&self, id: &str) -> Result<Option<ScanDetails>, ScrapeError> {
    validate_scan_id(id)?;
    let Some(session) = self.db.get_scan(id).await? else {
      return Ok(None);
    };

    let files = list_scanned_files(&session.directory, &self.config.watcher.content_extension).await?;
    let stdout = read_log(&session.log_directory.join("stdout.log")).await;
    let stderr = read_log(&session.log_directory.join("stderr.log")).await;

    Ok(Some(ScanDetails {
      session,
      files,
      stdout,
      stderr,
    }))
  }

  /// Remove a scan's rows and on-disk directories. Returns whether it existed.
  pub async fn delete_scan(&self, id: &str) -> Result<bool, ScrapeError> {
    validate_scan_id(id)?;
    let existed = self.db.delete_scan(id).await?;
    for dir in self.scan_dirs(id) {
      remove_dir_if_exists(&dir).await?;
    }
    info!(scan_id = %id, existed, "Deleted scan");
    Ok(existed)
  }

  /// Delete scans that started more than `days` ago. Returns how many were removed.
  pub async fn cleanup_old_scans(&self, days: u32) -> Result<usize, ScrapeError> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
    let old = self.db.scans_started_before(cutoff).await?;

    let mut cleaned = 0;
    for scan in old {
      match self.delete_scan(&scan.id).await {
        Ok(_) => {
          info!(scan_id = %scan.id, started_at = %scan.started_at, "Cleaned up old scan");
          cleaned += 1;
        }
        Err(e) => warn!(scan_id = %scan.id, err = %e, "Failed to clean up scan"),
      }
    }

    info!(cleaned, days, "Scan cleanup complete");
    Ok(cleaned)
  }

  fn scan_dirs(&self, id: &str) -> [PathBuf; 3] {
    let scrape = &self.config.scrape;
    [
      scrape.scrapes_dir().join(id),
      scrape.logs_dir().join(id),
      scrape.status_dir().join(id),
    ]
  }
}

fn decide_outcome(tool: &ToolOutcome, complete: bool, expected: usize, processed: usize) -> (ScanOutcome, Option<String>) {
  match tool {
    ToolOutcome::TimedOut => (ScanOutcome::Timeout, Some("timeout".to_string())),
    ToolOutcome::FailedToStart(reason) => (ScanOutcome::Failure, Some(reason.clone())),
    ToolOutcome::Exited(Some(0)) if complete => (ScanOutcome::Success, None),
    ToolOutcome::Exited(Some(0)) => (
      ScanOutcome::Failure,
      Some(format!("Ingested {processed} of {expected} files before the completion timeout")),
    ),
    ToolOutcome::Exited(Some(code)) => (ScanOutcome::Failure, Some(format!("Tool exited with status {code}"))),
    ToolOutcome::Exited(None) => (ScanOutcome::Failure, Some("Tool terminated by signal".to_string())),
  }
}

/// Scan ids become directory names; reject anything that could escape the base dir
fn validate_scan_id(id: &str) -> Result<(), ScrapeError> {
  let valid = !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\']);
  if valid {
    Ok(())
  } else {
    Err(ScrapeError::InvalidScanId(id.to_string()))
  }
}

async fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
  match tokio::fs::remove_file(path).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

async fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
  match tokio::fs::remove_dir_all(dir).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}
