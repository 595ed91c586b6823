//! Scan orchestration around the external enumeration tool

mod command;
mod details;
mod orchestrator;

#[cfg(test)]
mod __tests__;

use serde::{Deserialize, Serialize};

pub use command::{ToolOutcome, build_command};
pub use details::{ScanDetails, ScannedFile};
pub use orchestrator::Orchestrator;

use crate::{actor::WatcherError, db::DbError};

/// Sidecar written into each scan directory
pub const METADATA_FILE: &str = "scrape_metadata.json";

/// Empty marker files in `status/<id>/` naming the final outcome
pub const SUCCESS_MARKER: &str = "success";
pub const FAIL_MARKER: &str = "fail";

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Database error: {0}")]
  Db(#[from] DbError),
  #[error("Watcher error: {0}")]
  Watcher(#[from] WatcherError),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Invalid scan id: {0:?}")]
  InvalidScanId(String),
}

/// What to enumerate; empty lists mean everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
  pub services: Vec<String>,
  pub regions: Vec<String>,
  pub profile: Option<String>,
}
