// Scans table operations

use std::{path::PathBuf, sync::Arc};

use arrow_array::{Array, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::{debug, trace};

use crate::{
  db::{
    connection::{DbError, Result, ScanDb, escape_sql},
    schema::scans_schema,
  },
  domain::scan::{ScanOutcome, ScanSession},
};

impl ScanDb {
  /// Add a new scan session
  #[tracing::instrument(level = "trace", skip(self, scan), fields(id = %scan.id))]
  pub async fn add_scan(&self, scan: &ScanSession) -> Result<()> {
    debug!(
      table = "scans",
      operation = "insert",
      scan_id = %scan.id,
      outcome = %scan.outcome,
      "Creating scan"
    );

    let table = self.scans_table().await?;

    let batch = scan_to_batch(scan)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], scans_schema());

    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Replace a stored scan session with `scan`
  #[tracing::instrument(level = "trace", skip(self, scan), fields(id = %scan.id))]
  pub async fn update_scan(&self, scan: &ScanSession) -> Result<()> {
    trace!(
      table = "scans",
      operation = "update",
      scan_id = %scan.id,
      outcome = %scan.outcome,
      "Updating scan"
    );

    let table = self.scans_table().await?;

    let batch = scan_to_batch(scan)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], scans_schema());

    // Delete old and insert new
    table.delete(&format!("id = '{}'", escape_sql(&scan.id))).await?;
    table.add(Box::new(batches)).execute().await?;

    Ok(())
  }

  /// Get a scan by ID
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn get_scan(&self, id: &str) -> Result<Option<ScanSession>> {
    let table = self.scans_table().await?;

    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("id = '{}'", escape_sql(id)))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_scan(batch, 0)?));
      }
    }

    Ok(None)
  }

  /// List scans, newest first
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn list_scans(&self, success_only: bool, limit: Option<usize>, offset: usize) -> Result<Vec<ScanSession>> {
    let table = self.scans_table().await?;

    let query = if success_only {
      table
        .query()
        .only_if(format!("outcome = '{}'", ScanOutcome::Success.as_str()))
    } else {
      table.query()
    };

    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut scans = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        scans.push(batch_to_scan(&batch, i)?);
      }
    }

    scans.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    Ok(
      scans
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect(),
    )
  }

  /// Count scans, optionally only successful ones
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn count_scans(&self, success_only: bool) -> Result<usize> {
    let table = self.scans_table().await?;
    let filter = success_only.then(|| format!("outcome = '{}'", ScanOutcome::Success.as_str()));
    Ok(table.count_rows(filter).await?)
  }

  /// Scans that started before `cutoff`
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn scans_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScanSession>> {
    let table = self.scans_table().await?;

    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("started_at < {}", cutoff.timestamp_millis()))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut scans = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        scans.push(batch_to_scan(&batch, i)?);
      }
    }
    Ok(scans)
  }

  /// Delete a scan and all of its resources.
  ///
  /// Returns whether the scan existed.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn delete_scan(&self, id: &str) -> Result<bool> {
    let filter = format!("id = '{}'", escape_sql(id));
    let table = self.scans_table().await?;
    let existed = table.count_rows(Some(filter.clone())).await? > 0;

    let removed = self.delete_resources(id, None, None).await?;
    table.delete(&filter).await?;

    debug!(
      table = "scans",
      operation = "delete",
      scan_id = %id,
      existed,
      resources_removed = removed,
      "Deleted scan"
    );

    Ok(existed)
  }
}

/// Convert a ScanSession to an Arrow RecordBatch
fn scan_to_batch(scan: &ScanSession) -> Result<RecordBatch> {
  let id = StringArray::from(vec![scan.id.clone()]);
  let started_at = Int64Array::from(vec![scan.started_at.timestamp_millis()]);
  let ended_at = Int64Array::from(vec![scan.ended_at.map(|t| t.timestamp_millis())]);
  let directory = StringArray::from(vec![scan.directory.to_string_lossy().into_owned()]);
  let log_directory = StringArray::from(vec![scan.log_directory.to_string_lossy().into_owned()]);
  let command = StringArray::from(vec![serde_json::to_string(&scan.command)?]);
  let services = StringArray::from(vec![scan.services.as_ref().map(serde_json::to_string).transpose()?]);
  let regions = StringArray::from(vec![scan.regions.as_ref().map(serde_json::to_string).transpose()?]);
  let profile = StringArray::from(vec![scan.profile.clone()]);
  let return_code = Int32Array::from(vec![scan.return_code]);
  let expected_files = Int64Array::from(vec![scan.expected_files as i64]);
  let processed_files = Int64Array::from(vec![scan.processed_files as i64]);
  let outcome = StringArray::from(vec![scan.outcome.as_str()]);
  let error = StringArray::from(vec![scan.error.clone()]);

  let batch = RecordBatch::try_new(
    scans_schema(),
    vec![
      Arc::new(id),
      Arc::new(started_at),
      Arc::new(ended_at),
      Arc::new(directory),
      Arc::new(log_directory),
      Arc::new(command),
      Arc::new(services),
      Arc::new(regions),
      Arc::new(profile),
      Arc::new(return_code),
      Arc::new(expected_files),
      Arc::new(processed_files),
      Arc::new(outcome),
      Arc::new(error),
    ],
  )?;

  Ok(batch)
}

/// Convert a RecordBatch row to a ScanSession
fn batch_to_scan(batch: &RecordBatch, row: usize) -> Result<ScanSession> {
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

  let get_i64 = |name: &str| -> Result<i64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| DbError::NotFound(format!("column {}", name)))
  };

  let get_optional_i64 = |name: &str| -> Option<i64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
      .and_then(|a| if a.is_null(row) { None } else { Some(a.value(row)) })
  };

  let return_code = batch
    .column_by_name("return_code")
    .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
    .and_then(|a| if a.is_null(row) { None } else { Some(a.value(row)) });

  let started_at = Utc
    .timestamp_millis_opt(get_i64("started_at")?)
    .single()
    .ok_or_else(|| DbError::InvalidData("invalid started_at timestamp".into()))?;
  let ended_at = get_optional_i64("ended_at").and_then(|ts| Utc.timestamp_millis_opt(ts).single());

  let outcome = get_string("outcome")?
    .parse::<ScanOutcome>()
    .map_err(DbError::InvalidData)?;

  let services: Option<Vec<String>> = get_optional_string("services")
    .map(|s| serde_json::from_str(&s))
    .transpose()?;
  let regions: Option<Vec<String>> = get_optional_string("regions")
    .map(|s| serde_json::from_str(&s))
    .transpose()?;

  Ok(ScanSession {
    id: get_string("id")?,
    started_at,
    ended_at,
    directory: PathBuf::from(get_string("directory")?),
    log_directory: PathBuf::from(get_string("log_directory")?),
    command: serde_json::from_str(&get_string("command")?)?,
    services,
    regions,
    profile: get_optional_string("profile"),
    return_code,
    expected_files: get_i64("expected_files")?.max(0) as u64,
    processed_files: get_i64("processed_files")?.max(0) as u64,
    outcome,
    error: get_optional_string("error"),
  })
}
