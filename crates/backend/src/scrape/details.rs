use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{domain::scan::ScanSession, scrape::METADATA_FILE};

/// One file the tool produced for a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedFile {
  pub name: String,
  pub relative_path: PathBuf,
  pub size: u64,
  pub modified: Option<DateTime<Utc>>,
}

/// A stored scan plus what is still on disk for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDetails {
  pub session: ScanSession,
  pub files: Vec<ScannedFile>,
  pub stdout: Option<String>,
  pub stderr: Option<String>,
}

/// Recursively list produced `.{extension}` files under `root`, skipping the metadata sidecar
pub(crate) async fn list_scanned_files(root: &Path, extension: &str) -> std::io::Result<Vec<ScannedFile>> {
  let mut files = Vec::new();
  if !tokio::fs::try_exists(root).await? {
    return Ok(files);
  }

  let mut pending = vec![root.to_path_buf()];
  while let Some(dir) = pending.pop() {
    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let meta = entry.metadata().await?;

      if meta.is_dir() {
        pending.push(path);
        continue;
      }

      let name = entry.file_name().to_string_lossy().into_owned();
      let matches_extension = path.extension().and_then(|e| e.to_str()) == Some(extension);
      if !matches_extension || name == METADATA_FILE {
        continue;
      }

      files.push(ScannedFile {
        relative_path: path.strip_prefix(root).unwrap_or(&path).to_path_buf(),
        name,
        size: meta.len(),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
      });
    }
  }

  files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
  debug!(root = %root.display(), count = files.len(), "Listed scanned files");
  Ok(files)
}

/// Read a captured log if present
pub(crate) async fn read_log(path: &Path) -> Option<String> {
  tokio::fs::read_to_string(path).await.ok()
}
