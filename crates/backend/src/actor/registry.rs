//! PathRegistry - concurrent per-path state for one watch session
//!
//! Dedup relies on `DashMap`'s entry API: claiming a path is a single
//! check-then-insert under the shard lock, so two events for the same path can
//! never both win a claim.

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};

/// Lifecycle of a path known to the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
  /// A worker owns the path
  Processing,
  /// A record was accepted by the sink
  Processed,
  /// The last worker gave up; a fresh file event may claim it again
  Abandoned,
}

#[derive(Debug, Default)]
pub struct PathRegistry {
  paths: DashMap<PathBuf, PathState>,
  processed: AtomicUsize,
}

impl PathRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Atomically move a path into `Processing`.
  ///
  /// Returns false if the path is already in flight or already processed.
  pub fn try_claim(&self, path: &Path) -> bool {
    match self.paths.entry(path.to_path_buf()) {
      Entry::Vacant(entry) => {
        entry.insert(PathState::Processing);
        true
      }
      Entry::Occupied(mut entry) => match entry.get() {
        PathState::Abandoned => {
          entry.insert(PathState::Processing);
          true
        }
        PathState::Processing | PathState::Processed => false,
      },
    }
  }

  /// Record a successful sink write. Counts each path once.
  pub fn mark_processed(&self, path: &Path) -> bool {
    let previous = self.paths.insert(path.to_path_buf(), PathState::Processed);
    let newly_processed = previous != Some(PathState::Processed);
    if newly_processed {
      self.processed.fetch_add(1, Ordering::SeqCst);
    }
    newly_processed
  }

  /// Release a worker's claim; a path that was not processed becomes `Abandoned`
  pub fn release(&self, path: &Path) {
    if let Some(mut state) = self.paths.get_mut(path) {
      if *state == PathState::Processing {
        *state = PathState::Abandoned;
      }
    }
  }

  pub fn state(&self, path: &Path) -> Option<PathState> {
    self.paths.get(path).map(|s| *s.value())
  }

  pub fn is_processed(&self, path: &Path) -> bool {
    self.state(path) == Some(PathState::Processed)
  }

  pub fn processed_count(&self) -> usize {
    self.processed.load(Ordering::SeqCst)
  }

  pub fn in_flight_count(&self) -> usize {
    self
      .paths
      .iter()
      .filter(|entry| *entry.value() == PathState::Processing)
      .count()
  }

  /// Forget every path that has not been processed
  pub fn discard_in_flight(&self) {
    self.paths.retain(|_, state| *state == PathState::Processed);
  }
}
