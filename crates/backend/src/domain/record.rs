use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::filename::ParsedFilename;

/// A normalized unit of inventory produced from one output file.
///
/// The payload is whatever the enumeration tool wrote, kept verbatim; its shape
/// varies per service and operation and is only validated as parseable JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedRecord {
  pub id: Uuid,
  pub scan_id: String,
  pub service: String,
  pub operation: String,
  pub region: Option<String>,
  pub account: Option<String>,
  pub filename: String,
  pub file_path: PathBuf,
  pub ingested_at: DateTime<Utc>,
  pub payload: serde_json::Value,
}

impl IngestedRecord {
  pub fn new(scan_id: &str, path: &Path, parsed: ParsedFilename, payload: serde_json::Value) -> Self {
    let filename = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();

    Self {
      id: Uuid::now_v7(),
      scan_id: scan_id.to_string(),
      service: parsed.service,
      operation: parsed.operation,
      region: parsed.region,
      account: parsed.account,
      filename,
      file_path: path.to_path_buf(),
      ingested_at: Utc::now(),
      payload,
    }
  }
}
