// Resources table operations

use std::{path::PathBuf, sync::Arc};

use arrow_array::{Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
  actor::RecordSink,
  db::{
    connection::{DbError, Result, ScanDb, escape_sql},
    schema::resources_schema,
  },
  domain::record::IngestedRecord,
};

/// Optional equality filters over the resources table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
  pub scan_id: Option<String>,
  pub service: Option<String>,
  pub region: Option<String>,
  pub operation: Option<String>,
}

impl ResourceFilter {
  pub fn for_scan(scan_id: &str) -> Self {
    Self {
      scan_id: Some(scan_id.to_string()),
      ..Default::default()
    }
  }

  /// Build the filter expression, or None when nothing is filtered
  fn to_sql(&self) -> Option<String> {
    let clauses: Vec<String> = [
      ("scan_id", &self.scan_id),
      ("service", &self.service),
      ("region", &self.region),
      ("operation", &self.operation),
    ]
    .into_iter()
    .filter_map(|(column, value)| {
      value
        .as_ref()
        .map(|v| format!("{} = '{}'", column, escape_sql(v)))
    })
    .collect();

    if clauses.is_empty() {
      None
    } else {
      Some(clauses.join(" AND "))
    }
  }
}

impl ScanDb {
  /// Insert one ingested record
  #[tracing::instrument(level = "trace", skip(self, record), fields(id = %record.id, scan_id = %record.scan_id))]
  pub async fn add_resource(&self, record: &IngestedRecord) -> Result<()> {
    debug!(
      table = "resources",
      operation = "insert",
      scan_id = %record.scan_id,
      service = %record.service,
      filename = %record.filename,
      "Saving resource"
    );

    let table = self.resources_table().await?;

    let batch = record_to_batch(record)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], resources_schema());

    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Query resources, newest ingestion first
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn query_resources(
    &self,
    filter: &ResourceFilter,
    limit: Option<usize>,
    offset: usize,
  ) -> Result<Vec<IngestedRecord>> {
    let records = self.fetch_records(filter.to_sql()).await?;

    Ok(
      records
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect(),
    )
  }

  /// The same service/region/operation across scans, newest first.
  ///
  /// `region: None` matches only records without a region (global services).
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn compare_resources(
    &self,
    service: &str,
    region: Option<&str>,
    operation: &str,
    limit: usize,
  ) -> Result<Vec<IngestedRecord>> {
    let region_clause = match region {
      Some(region) => format!("region = '{}'", escape_sql(region)),
      None => "region IS NULL".to_string(),
    };
    let filter = format!(
      "service = '{}' AND operation = '{}' AND {}",
      escape_sql(service),
      escape_sql(operation),
      region_clause
    );

    let mut records = self.fetch_records(Some(filter)).await?;
    records.truncate(limit);
    Ok(records)
  }

  async fn fetch_records(&self, filter: Option<String>) -> Result<Vec<IngestedRecord>> {
    let table = self.resources_table().await?;

    let query = match filter {
      Some(f) => table.query().only_if(f),
      None => table.query(),
    };

    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut records = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        records.push(batch_to_record(&batch, i)?);
      }
    }

    records.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at));
    Ok(records)
  }

  /// Count resources, optionally for one scan
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn count_resources(&self, scan_id: Option<&str>) -> Result<usize> {
    let table = self.resources_table().await?;
    let filter = scan_id.map(|id| format!("scan_id = '{}'", escape_sql(id)));
    Ok(table.count_rows(filter).await?)
  }

  /// Delete a scan's resources, optionally narrowed by service and region.
  ///
  /// Returns the number of rows removed.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn delete_resources(&self, scan_id: &str, service: Option<&str>, region: Option<&str>) -> Result<usize> {
    let filter = ResourceFilter {
      scan_id: Some(scan_id.to_string()),
      service: service.map(String::from),
      region: region.map(String::from),
      operation: None,
    }
    .to_sql()
    .ok_or_else(|| DbError::InvalidData("empty resource filter".into()))?;

    let table = self.resources_table().await?;
    let count = table.count_rows(Some(filter.clone())).await?;
    if count > 0 {
      table.delete(&filter).await?;
    }

    debug!(
      table = "resources",
      operation = "delete",
      scan_id = %scan_id,
      removed = count,
      "Deleted resources"
    );
    Ok(count)
  }
}

#[async_trait]
impl RecordSink for ScanDb {
  async fn insert(&self, record: &IngestedRecord) -> bool {
    match self.add_resource(record).await {
      Ok(()) => true,
      Err(e) => {
        error!(
          scan_id = %record.scan_id,
          filename = %record.filename,
          err = %e,
          "Failed to save resource"
        );
        false
      }
    }
  }
}

/// Convert an IngestedRecord to an Arrow RecordBatch
fn record_to_batch(record: &IngestedRecord) -> Result<RecordBatch> {
  let id = StringArray::from(vec![record.id.to_string()]);
  let scan_id = StringArray::from(vec![record.scan_id.clone()]);
  let service = StringArray::from(vec![record.service.clone()]);
  let operation = StringArray::from(vec![record.operation.clone()]);
  let region = StringArray::from(vec![record.region.clone()]);
  let account = StringArray::from(vec![record.account.clone()]);
  let filename = StringArray::from(vec![record.filename.clone()]);
  let file_path = StringArray::from(vec![record.file_path.to_string_lossy().into_owned()]);
  let ingested_at = Int64Array::from(vec![record.ingested_at.timestamp_millis()]);
  let payload = StringArray::from(vec![serde_json::to_string(&record.payload)?]);

  let batch = RecordBatch::try_new(
    resources_schema(),
    vec![
      Arc::new(id),
      Arc::new(scan_id),
      Arc::new(service),
      Arc::new(operation),
      Arc::new(region),
      Arc::new(account),
      Arc::new(filename),
      Arc::new(file_path),
      Arc::new(ingested_at),
      Arc::new(payload),
    ],
  )?;

  Ok(batch)
}

/// Convert a RecordBatch row to an IngestedRecord
fn batch_to_record(batch: &RecordBatch, row: usize) -> Result<IngestedRecord> {
  let get_string = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| DbError::NotFound(format!("column {}", name)))
  };

  let get_optional_string = |name: &str| -> Option<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .and_then(|a| {
        if a.is_null(row) {
          None
        } else {
          Some(a.value(row).to_string())
        }
      })
  };

  let ingested_ms = batch
    .column_by_name("ingested_at")
    .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound("column ingested_at".into()))?;
  let ingested_at = Utc
    .timestamp_millis_opt(ingested_ms)
    .single()
    .ok_or_else(|| DbError::InvalidData("invalid ingested_at timestamp".into()))?;

  let id_str = get_string("id")?;

  Ok(IngestedRecord {
    id: Uuid::parse_str(&id_str).map_err(|_| DbError::InvalidData(format!("invalid resource id {}", id_str)))?,
    scan_id: get_string("scan_id")?,
    service: get_string("service")?,
    operation: get_string("operation")?,
    region: get_optional_string("region"),
    account: get_optional_string("account"),
    filename: get_string("filename")?,
    file_path: PathBuf::from(get_string("file_path")?),
    ingested_at,
    payload: serde_json::from_str(&get_string("payload")?)?,
  })
}
