// Aggregate statistics across the scan store

use std::{
  collections::{BTreeMap, BTreeSet},
  time::Instant,
};

use arrow_array::{Array, RecordBatch, StringArray};
use chrono::{Duration, NaiveDate, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Result, ScanDb, connection::escape_sql};
use crate::domain::scan::ScanOutcome;

/// Label for records without a region in per-region breakdowns
pub const GLOBAL_REGION: &str = "global";

/// Store-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
  pub total_scans: usize,
  pub successful_scans: usize,
  pub total_resources: usize,
  /// Distinct services with at least one resource, sorted
  pub services: Vec<String>,
  /// Distinct non-empty regions, sorted
  pub regions: Vec<String>,
  pub latest_scan: Option<String>,
}

/// Resource count for one service with the regions and operations it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBreakdown {
  pub service: String,
  pub resource_count: usize,
  pub regions: Vec<String>,
  pub operations: Vec<String>,
}

/// Resource count for one region with the services and operations seen there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBreakdown {
  pub region: String,
  pub resource_count: usize,
  pub services: Vec<String>,
  pub operations: Vec<String>,
}

/// Scans started on one UTC day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
  pub date: NaiveDate,
  pub total_scans: usize,
  pub successful_scans: usize,
  /// Sum of `processed_files` over the day's scans
  pub resources: u64,
}

#[derive(Default)]
struct Group {
  count: usize,
  members: BTreeSet<String>,
  operations: BTreeSet<String>,
}

impl ScanDb {
  /// Compute store-wide statistics
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn stats(&self) -> Result<StoreStats> {
    let start = Instant::now();

    let total_scans = self.count_scans(false).await?;
    let successful_scans = self.count_scans(true).await?;
    let total_resources = self.count_resources(None).await?;
    let latest_scan = self.list_scans(false, Some(1), 0).await?.into_iter().next().map(|s| s.id);

    let table = self.resources_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .select(Select::columns(&["service", "region"]))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut services = BTreeSet::new();
    let mut regions = BTreeSet::new();
    for batch in &results {
      collect_distinct(batch, "service", &mut services);
      collect_distinct(batch, "region", &mut regions);
    }

    trace!(
      total_scans,
      total_resources,
      elapsed_ms = start.elapsed().as_millis() as u64,
      "Computed store stats"
    );

    Ok(StoreStats {
      total_scans,
      successful_scans,
      total_resources,
      services: services.into_iter().collect(),
      regions: regions.into_iter().collect(),
      latest_scan,
    })
  }

  /// Resources grouped by service, largest first
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn service_breakdown(&self, scan_id: Option<&str>) -> Result<Vec<ServiceBreakdown>> {
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for (service, region, operation) in self.resource_keys(scan_id).await? {
      let group = groups.entry(service).or_default();
      group.count += 1;
      group.members.insert(region.unwrap_or_else(|| GLOBAL_REGION.to_string()));
      group.operations.insert(operation);
    }

    let mut breakdown: Vec<ServiceBreakdown> = groups
      .into_iter()
      .map(|(service, group)| ServiceBreakdown {
        service,
        resource_count: group.count,
        regions: group.members.into_iter().collect(),
        operations: group.operations.into_iter().collect(),
      })
      .collect();

    breakdown.sort_by(|a, b| b.resource_count.cmp(&a.resource_count).then_with(|| a.service.cmp(&b.service)));
    Ok(breakdown)
  }

  /// Resources grouped by region, largest first. Records without a region
  /// are grouped under [`GLOBAL_REGION`].
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn region_breakdown(&self, scan_id: Option<&str>) -> Result<Vec<RegionBreakdown>> {
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for (service, region, operation) in self.resource_keys(scan_id).await? {
      let group = groups
        .entry(region.unwrap_or_else(|| GLOBAL_REGION.to_string()))
        .or_default();
      group.count += 1;
      group.members.insert(service);
      group.operations.insert(operation);
    }

    let mut breakdown: Vec<RegionBreakdown> = groups
      .into_iter()
      .map(|(region, group)| RegionBreakdown {
        region,
        resource_count: group.count,
        services: group.members.into_iter().collect(),
        operations: group.operations.into_iter().collect(),
      })
      .collect();

    breakdown.sort_by(|a, b| b.resource_count.cmp(&a.resource_count).then_with(|| a.region.cmp(&b.region)));
    Ok(breakdown)
  }

  /// Per-day scan activity over the last `days` days, oldest day first
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn timeline(&self, days: u32) -> Result<Vec<DailyActivity>> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));

    let mut by_day: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();
    for scan in self.list_scans(false, None, 0).await? {
      if scan.started_at < cutoff {
        continue;
      }
      let date = scan.started_at.date_naive();
      let day = by_day.entry(date).or_insert_with(|| DailyActivity {
        date,
        total_scans: 0,
        successful_scans: 0,
        resources: 0,
      });
      day.total_scans += 1;
      if scan.outcome == ScanOutcome::Success {
        day.successful_scans += 1;
      }
      day.resources += scan.processed_files;
    }

    Ok(by_day.into_values().collect())
  }

  /// `(service, region, operation)` of every resource, payload not loaded
  async fn resource_keys(&self, scan_id: Option<&str>) -> Result<Vec<(String, Option<String>, String)>> {
    let table = self.resources_table().await?;

    let query = table.query().select(Select::columns(&["service", "region", "operation"]));
    let query = match scan_id {
      Some(id) => query.only_if(format!("scan_id = '{}'", escape_sql(id))),
      None => query,
    };
    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut keys = Vec::new();
    for batch in &results {
      let (Some(services), Some(regions), Some(operations)) = (
        string_column(batch, "service"),
        string_column(batch, "region"),
        string_column(batch, "operation"),
      ) else {
        continue;
      };
      for i in 0..batch.num_rows() {
        let region = (!regions.is_null(i) && !regions.value(i).is_empty()).then(|| regions.value(i).to_string());
        keys.push((services.value(i).to_string(), region, operations.value(i).to_string()));
      }
    }

    Ok(keys)
  }
}

fn string_column<'a>(batch: &'a RecordBatch, column: &str) -> Option<&'a StringArray> {
  batch
    .column_by_name(column)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn collect_distinct(batch: &RecordBatch, column: &str, into: &mut BTreeSet<String>) {
  let Some(values) = batch
    .column_by_name(column)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
  else {
    return;
  };

  for i in 0..values.len() {
    if !values.is_null(i) && !values.value(i).is_empty() {
      into.insert(values.value(i).to_string());
    }
  }
}
