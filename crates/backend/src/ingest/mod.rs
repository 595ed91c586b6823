//! Per-file ingestion building blocks: filename heuristics, content parsing,
//! and the size-based stability check.

pub mod content;
pub mod filename;
pub mod stability;

pub use content::{ContentError, parse_content, read_content};
pub use filename::{ParsedFilename, parse_filename};
pub use stability::{NotReadyReason, Readiness, StabilityDetector};
