use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::PathRegistry;

/// Blocks a caller until the watcher has processed enough files.
///
/// The timeout only bounds the caller's wait; workers keep running.
pub struct CompletionGate {
  registry: Arc<PathRegistry>,
  poll_interval: Duration,
  stopped: CancellationToken,
}

impl CompletionGate {
  pub fn new(registry: Arc<PathRegistry>, poll_interval: Duration, stopped: CancellationToken) -> Self {
    Self {
      registry,
      poll_interval,
      stopped,
    }
  }

  /// Poll until `expected` files are processed or `timeout` elapses.
  ///
  /// `expected == 0` is satisfied immediately. Returns early if the watcher
  /// stops while waiting.
  pub async fn wait(&self, expected: usize, timeout: Duration) -> bool {
    if expected == 0 {
      return true;
    }

    let deadline = Instant::now() + timeout;
    loop {
      let processed = self.registry.processed_count();
      if processed >= expected {
        info!(expected, processed, "All expected files processed");
        return true;
      }

      let now = Instant::now();
      if now >= deadline {
        info!(
          expected,
          processed,
          timeout_secs = timeout.as_secs_f64(),
          "Timed out waiting for file processing"
        );
        return false;
      }

      debug!(expected, processed, "Waiting for file processing");
      let nap = self.poll_interval.min(deadline - now);
      tokio::select! {
        biased;
        _ = self.stopped.cancelled() => {
          debug!("Watcher stopped while waiting for completion");
          return self.registry.processed_count() >= expected;
        }
        _ = tokio::time::sleep(nap) => {}
      }
    }
  }
}
