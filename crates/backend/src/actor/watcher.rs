//! DirectoryWatcher - incremental ingestion of a directory being written to
//!
//! The watcher subscribes to create/modify events on one directory and hands
//! each candidate path to an [`IngestWorker`], at most one worker per path.
//!
//! # Design
//!
//! The watcher bridges the sync notify callbacks with tokio:
//! 1. notify's sync callback uses `blocking_send` to forward events to a channel
//! 2. An async event loop consumes the channel and filters candidate paths
//! 3. Each path is claimed in the [`PathRegistry`]; only the claim winner spawns a worker
//! 4. Workers run on a `TaskTracker` so `stop()` can join them
//!
//! # Lifecycle
//!
//! `start(dir, scan_id)` opens a session; `stop()` ends it:
//! - the event loop is cancelled, dropping the notify subscription
//! - outstanding workers get `stop_grace` to finish
//! - remaining workers are torn down and skip their sink submission
//! - the processed count is frozen and stays readable

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use notify::{
  Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
  event::{CreateKind, ModifyKind, RenameMode},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, trace, warn};

use super::{gate::CompletionGate, registry::PathRegistry, sink::RecordSink, worker::IngestWorker};
use crate::domain::config::WatcherConfig;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while starting a watch session
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
  #[error("Failed to create watch directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),

  #[error("Failed to watch path: {0}")]
  Watch(#[source] notify::Error),
}

// ============================================================================
// Dispatch
// ============================================================================

/// Claims paths and spawns workers for one session
#[derive(Clone)]
pub(crate) struct Dispatcher {
  registry: Arc<PathRegistry>,
  worker: Arc<IngestWorker>,
  tracker: TaskTracker,
}

impl Dispatcher {
  /// Spawn a worker for `path` unless one already owns it.
  ///
  /// Returns whether a worker was spawned.
  pub(crate) fn dispatch(&self, path: &Path) -> bool {
    if !self.registry.try_claim(path) {
      trace!(path = %path.display(), "Path already in flight or processed");
      return false;
    }

    debug!(path = %path.display(), scan_id = %self.worker.scan_id(), "Dispatching ingestion worker");
    let worker = Arc::clone(&self.worker);
    let path = path.to_path_buf();
    self.tracker.spawn(async move {
      worker.run(path).await;
    });
    true
  }
}

/// Event loop owning the notify subscription
struct EventLoop {
  config: Arc<WatcherConfig>,
  dispatcher: Dispatcher,
  cancel: CancellationToken,
  // The notify watcher must be held to keep it alive
  _watcher: RecommendedWatcher,
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
}

impl EventLoop {
  async fn run(mut self) {
    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          debug!("Event loop shutting down (cancelled)");
          break;
        }

        event = self.event_rx.recv() => {
          match event {
            Some(Ok(event)) => self.process_event(event),
            Some(Err(e)) => {
              warn!(error = %e, "Watcher error");
            }
            None => {
              debug!("Event loop shutting down (channel closed)");
              break;
            }
          }
        }
      }
    }
  }

  fn process_event(&self, event: Event) {
    let paths: &[PathBuf] = match event.kind {
      EventKind::Create(CreateKind::Folder) => {
        trace!(paths = ?event.paths, "Ignoring directory creation");
        return;
      }
      EventKind::Create(_) => &event.paths,
      // Both paths in one event: paths[0] = from, paths[1] = to
      EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1..).unwrap_or_default(),
      EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
        trace!(paths = ?event.paths, "Ignoring rename source");
        return;
      }
      EventKind::Modify(_) => &event.paths,
      EventKind::Remove(_) | EventKind::Access(_) | EventKind::Any | EventKind::Other => {
        trace!(kind = ?event.kind, "Ignoring event");
        return;
      }
    };

    for path in paths {
      if !self.config.is_candidate(path) {
        trace!(path = %path.display(), "Skipping non-candidate file");
        continue;
      }
      trace!(path = %path.display(), kind = ?event.kind, "Candidate file event");
      self.dispatcher.dispatch(path);
    }
  }
}

/// State that exists only while watching
struct WatchSession {
  scan_id: String,
  directory: PathBuf,
  registry: Arc<PathRegistry>,
  #[cfg_attr(not(test), allow(dead_code))]
  dispatcher: Dispatcher,
  tracker: TaskTracker,
  /// Stops the event loop
  cancel: CancellationToken,
  /// Cancels workers that outlive the grace period
  teardown: CancellationToken,
  event_loop: JoinHandle<()>,
}

// ============================================================================
// DirectoryWatcher
// ============================================================================

/// Watches one output directory per scan session and ingests what appears in it
///
/// # Example
///
/// ```ignore
/// let mut watcher = DirectoryWatcher::new(config.watcher.clone(), sink);
/// watcher.start(&output_dir, &scan_id).await?;
/// // ... run the external tool ...
/// let complete = watcher.wait_for_completion(expected, timeout).await;
/// watcher.stop().await;
/// ```
pub struct DirectoryWatcher {
  config: Arc<WatcherConfig>,
  sink: Arc<dyn RecordSink>,
  session: Option<WatchSession>,
  frozen_processed: usize,
}

impl DirectoryWatcher {
  pub fn new(config: WatcherConfig, sink: Arc<dyn RecordSink>) -> Self {
    Self {
      config: Arc::new(config),
      sink,
      session: None,
      frozen_processed: 0,
    }
  }

  /// Begin watching `directory`, tagging every record with `scan_id`.
  ///
  /// Creates the directory if needed. A session already in progress is
  /// stopped first.
  pub async fn start(&mut self, directory: &Path, scan_id: &str) -> Result<(), WatcherError> {
    if self.session.is_some() {
      self.stop().await;
    }

    tokio::fs::create_dir_all(directory)
      .await
      .map_err(|source| WatcherError::CreateDir {
        path: directory.to_path_buf(),
        source,
      })?;

    info!(directory = %directory.display(), scan_id, "Starting directory watcher");

    // The sync callback uses blocking_send, so it needs a reasonable buffer
    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(self.config.event_buffer.max(1));

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // Runs on notify's thread; a closed channel means the session ended
        let _ = event_tx.blocking_send(res);
      },
      NotifyConfig::default(),
    )
    .map_err(WatcherError::Init)?;

    watcher
      .watch(directory, RecursiveMode::NonRecursive)
      .map_err(WatcherError::Watch)?;

    let registry = Arc::new(PathRegistry::new());
    let tracker = TaskTracker::new();
    let cancel = CancellationToken::new();
    let teardown = CancellationToken::new();

    let worker = IngestWorker::new(
      scan_id,
      &self.config,
      Arc::clone(&registry),
      Arc::clone(&self.sink),
      teardown.clone(),
    );
    let dispatcher = Dispatcher {
      registry: Arc::clone(&registry),
      worker: Arc::new(worker),
      tracker: tracker.clone(),
    };

    let event_loop = EventLoop {
      config: Arc::clone(&self.config),
      dispatcher: dispatcher.clone(),
      cancel: cancel.clone(),
      _watcher: watcher,
      event_rx,
    };

    self.frozen_processed = 0;
    self.session = Some(WatchSession {
      scan_id: scan_id.to_string(),
      directory: directory.to_path_buf(),
      registry,
      dispatcher,
      tracker,
      cancel,
      teardown,
      event_loop: tokio::spawn(event_loop.run()),
    });

    Ok(())
  }

  /// Stop watching and join outstanding workers up to the grace period.
  ///
  /// No-op when not watching.
  pub async fn stop(&mut self) {
    let Some(session) = self.session.take() else {
      return;
    };

    session.cancel.cancel();
    if let Err(e) = session.event_loop.await {
      warn!(error = %e, "Watcher event loop ended abnormally");
    }

    session.tracker.close();
    let grace = self.config.stop_grace();
    if tokio::time::timeout(grace, session.tracker.wait()).await.is_err() {
      warn!(
        scan_id = %session.scan_id,
        outstanding = session.tracker.len(),
        grace_secs = grace.as_secs_f64(),
        "Workers still running after grace period, abandoning them"
      );
    }
    session.teardown.cancel();
    session.registry.discard_in_flight();

    self.frozen_processed = session.registry.processed_count();
    info!(
      scan_id = %session.scan_id,
      directory = %session.directory.display(),
      processed = self.frozen_processed,
      "Stopped directory watcher"
    );
  }

  pub fn is_watching(&self) -> bool {
    self.session.is_some()
  }

  pub fn scan_id(&self) -> Option<&str> {
    self.session.as_ref().map(|s| s.scan_id.as_str())
  }

  /// Files ingested in the current (or most recent) session
  pub fn processed_count(&self) -> usize {
    match &self.session {
      Some(session) => session.registry.processed_count(),
      None => self.frozen_processed,
    }
  }

  /// Wait until `expected` files are processed or `timeout` elapses
  pub async fn wait_for_completion(&self, expected: usize, timeout: Duration) -> bool {
    match &self.session {
      Some(session) => {
        let gate = CompletionGate::new(
          Arc::clone(&session.registry),
          self.config.completion_poll(),
          session.cancel.clone(),
        );
        gate.wait(expected, timeout).await
      }
      None => self.frozen_processed >= expected,
    }
  }

  #[cfg(test)]
  pub(crate) fn dispatcher(&self) -> Option<Dispatcher> {
    self.session.as_ref().map(|s| s.dispatcher.clone())
  }
}

impl Drop for DirectoryWatcher {
  fn drop(&mut self) {
    if let Some(session) = self.session.take() {
      session.cancel.cancel();
      session.teardown.cancel();
    }
  }
}
