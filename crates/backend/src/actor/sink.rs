use async_trait::async_trait;

use crate::domain::record::IngestedRecord;

/// Destination for ingested records.
///
/// Workers call `insert` concurrently and never serialize across paths, so
/// implementations must be safe to share. A `false` return means the record
/// was not persisted; the worker logs it and leaves the path unprocessed.
#[async_trait]
pub trait RecordSink: Send + Sync {
  async fn insert(&self, record: &IngestedRecord) -> bool;
}
