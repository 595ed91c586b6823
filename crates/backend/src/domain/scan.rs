use std::{fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal (or in-progress) state of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
  Running,
  Success,
  Failure,
  Timeout,
}

impl ScanOutcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      ScanOutcome::Running => "running",
      ScanOutcome::Success => "success",
      ScanOutcome::Failure => "failure",
      ScanOutcome::Timeout => "timeout",
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, ScanOutcome::Success)
  }
}

impl fmt::Display for ScanOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ScanOutcome {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "running" => Ok(ScanOutcome::Running),
      "success" => Ok(ScanOutcome::Success),
      "failure" => Ok(ScanOutcome::Failure),
      "timeout" => Ok(ScanOutcome::Timeout),
      other => Err(format!("unknown scan outcome: {other}")),
    }
  }
}

/// Metadata describing one end-to-end scan run.
///
/// Owned by the orchestrator: created before the tool starts and updated once
/// ingestion has settled. The watcher never touches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
  pub id: String,
  pub started_at: DateTime<Utc>,
  pub ended_at: Option<DateTime<Utc>>,
  pub directory: PathBuf,
  pub log_directory: PathBuf,
  pub command: Vec<String>,
  pub services: Option<Vec<String>>,
  pub regions: Option<Vec<String>>,
  pub profile: Option<String>,
  pub return_code: Option<i32>,
  pub expected_files: u64,
  pub processed_files: u64,
  pub outcome: ScanOutcome,
  pub error: Option<String>,
}

impl ScanSession {
  pub fn new(id: String, directory: PathBuf, log_directory: PathBuf) -> Self {
    Self {
      id,
      started_at: Utc::now(),
      ended_at: None,
      directory,
      log_directory,
      command: Vec::new(),
      services: None,
      regions: None,
      profile: None,
      return_code: None,
      expected_files: 0,
      processed_files: 0,
      outcome: ScanOutcome::Running,
      error: None,
    }
  }

  /// Wall-clock duration, if the session has ended
  pub fn duration_seconds(&self) -> Option<f64> {
    self
      .ended_at
      .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
  }

  /// Mark the session finished with the given outcome
  pub fn finish(&mut self, outcome: ScanOutcome) {
    self.ended_at = Some(Utc::now());
    self.outcome = outcome;
  }
}

/// Generate a unique scan id: `scrape_<YYYYMMDD>_<HHMMSS>_<8 hex>` (UTC)
pub fn generate_scan_id() -> String {
  generate_scan_id_at(Utc::now())
}

fn generate_scan_id_at(now: DateTime<Utc>) -> String {
  let unique = Uuid::new_v4().simple().to_string();
  format!("scrape_{}_{}", now.format("%Y%m%d_%H%M%S"), &unique[..8])
}
