//! Stability detection for files written by an external process
//!
//! The enumeration tool gives no completion signal, so a file is considered
//! finished once its size stops changing:
//! 1. Sample the size every `sample_interval`
//! 2. Count consecutive samples equal to the previous non-zero size; any change resets the count
//! 3. Once the count reaches `stable_samples`, wait `settle_delay` more
//! 4. Read and parse the full content; only parseable content is ready
//!
//! Missing or unreadable files are re-sampled until `max_wait` runs out.
//! Every sleep races the teardown token so a stopped watcher never leaves a
//! sampling loop behind.

use std::{path::Path, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::content::{ContentError, read_content};
use crate::domain::config::WatcherConfig;

/// Result of a stability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
  Ready,
  NotReady(NotReadyReason),
}

impl Readiness {
  pub fn is_ready(&self) -> bool {
    matches!(self, Readiness::Ready)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
  /// Size never settled within the max wait
  Timeout,
  /// File vanished or became unreadable after settling
  Missing,
  /// Settled at zero bytes or whitespace only
  Empty,
  /// Settled, but the content does not parse
  Unparseable,
  /// The owning watcher was torn down mid-wait
  Cancelled,
}

impl NotReadyReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      NotReadyReason::Timeout => "timeout",
      NotReadyReason::Missing => "missing",
      NotReadyReason::Empty => "empty",
      NotReadyReason::Unparseable => "unparseable",
      NotReadyReason::Cancelled => "cancelled",
    }
  }
}

impl std::fmt::Display for NotReadyReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Polls a file until it stops growing and holds parseable content
#[derive(Debug, Clone)]
pub struct StabilityDetector {
  sample_interval: Duration,
  stable_samples: u32,
  max_wait: Duration,
  settle_delay: Duration,
  cancel: CancellationToken,
}

impl StabilityDetector {
  pub fn new(config: &WatcherConfig, cancel: CancellationToken) -> Self {
    Self {
      sample_interval: config.sample_interval(),
      stable_samples: config.stable_samples,
      max_wait: config.max_wait(),
      settle_delay: config.settle_delay(),
      cancel,
    }
  }

  /// Wait for `path` to stabilize and verify its content.
  ///
  /// Never errors: every failure mode maps to a [`NotReadyReason`].
  pub async fn check(&self, path: &Path) -> Readiness {
    match self.wait_for_stable_size(path).await {
      Readiness::Ready => {}
      not_ready => return not_ready,
    }

    if !self.sleep(self.settle_delay).await {
      return Readiness::NotReady(NotReadyReason::Cancelled);
    }

    match read_content(path).await {
      Ok(_) => Readiness::Ready,
      Err(ContentError::Io(e)) => {
        debug!(path = %path.display(), error = %e, "File unreadable after settling");
        Readiness::NotReady(NotReadyReason::Missing)
      }
      Err(ContentError::Empty) => Readiness::NotReady(NotReadyReason::Empty),
      Err(ContentError::Parse(e)) => {
        debug!(path = %path.display(), error = %e, "File not parseable after settling");
        Readiness::NotReady(NotReadyReason::Unparseable)
      }
    }
  }

  async fn wait_for_stable_size(&self, path: &Path) -> Readiness {
    let deadline = Instant::now() + self.max_wait;
    let mut last_size: Option<u64> = None;
    let mut stable_count = 0u32;

    while stable_count < self.stable_samples {
      if Instant::now() >= deadline {
        debug!(
          path = %path.display(),
          max_wait_ms = self.max_wait.as_millis() as u64,
          last_size = ?last_size,
          "File did not stabilize"
        );
        return Readiness::NotReady(NotReadyReason::Timeout);
      }

      match tokio::fs::metadata(path).await {
        Ok(meta) => {
          let size = meta.len();
          if size > 0 && last_size == Some(size) {
            stable_count += 1;
          } else {
            stable_count = 0;
            last_size = Some(size);
          }
          trace!(path = %path.display(), size, stable_count, "Sampled file size");
        }
        Err(e) => {
          // Not yet created, or locked by the writer
          trace!(path = %path.display(), error = %e, "File not available for sampling");
        }
      }

      if stable_count >= self.stable_samples {
        break;
      }

      if !self.sleep(self.sample_interval).await {
        return Readiness::NotReady(NotReadyReason::Cancelled);
      }
    }

    Readiness::Ready
  }

  /// Returns false if cancelled before the duration elapsed
  async fn sleep(&self, duration: Duration) -> bool {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => false,
      _ = tokio::time::sleep(duration) => true,
    }
  }
}
