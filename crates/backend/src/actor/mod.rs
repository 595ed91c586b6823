//! Concurrent ingestion of files produced by a long-running external process
//!
//! # Components
//!
//! - [`DirectoryWatcher`]: owns one watch session; bridges notify events into tokio
//! - [`IngestWorker`]: per-path stability wait, parse, and sink submission
//! - [`PathRegistry`]: concurrent in-flight/processed sets with atomic claims
//! - [`CompletionGate`]: lets the orchestrator wait for an expected file count
//! - [`RecordSink`]: where records go (the scan store in production)
//!
//! ```text
//! notify thread ──blocking_send──▶ EventLoop ──claim──▶ PathRegistry
//!                                      │
//!                                      └──spawn──▶ IngestWorker ──insert──▶ RecordSink
//! ```

pub mod gate;
pub mod registry;
pub mod sink;
pub mod watcher;
pub mod worker;

#[cfg(test)]
mod __tests__;

pub use gate::CompletionGate;
pub use registry::{PathRegistry, PathState};
pub use sink::RecordSink;
pub use watcher::{DirectoryWatcher, WatcherError};
pub use worker::{IngestOutcome, IngestWorker};
