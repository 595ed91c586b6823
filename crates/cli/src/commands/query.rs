use anyhow::{Context, Result};
use cloudscrape::{
  config::Config,
  db::{GLOBAL_REGION, ResourceFilter},
};

use super::open_store;
use crate::format::{format_comparison, format_record_list};

/// Query ingested records for a scan
pub async fn cmd_query(config: &Config, filter: ResourceFilter, limit: usize, json_output: bool) -> Result<()> {
  let db = open_store(config).await?;
  let records = db
    .query_resources(&filter, Some(limit), 0)
    .await
    .context("Failed to query resources")?;

  if json_output {
    println!("{}", serde_json::to_string_pretty(&records)?);
    return Ok(());
  }

  if records.is_empty() {
    println!("No resources found");
    return Ok(());
  }

  println!("Found {} resources:\n", records.len());
  print!("{}", format_record_list(&records));
  Ok(())
}

/// Show one service/region/operation across scans, newest first
pub async fn cmd_compare(
  config: &Config,
  service: &str,
  region: Option<&str>,
  operation: &str,
  limit: usize,
  json_output: bool,
) -> Result<()> {
  let db = open_store(config).await?;
  let records = db
    .compare_resources(service, region, operation, limit)
    .await
    .context("Failed to compare resources")?;

  if json_output {
    println!("{}", serde_json::to_string_pretty(&records)?);
    return Ok(());
  }

  if records.is_empty() {
    println!("No scans recorded {} {} in {}", service, operation, region.unwrap_or(GLOBAL_REGION));
    return Ok(());
  }

  print!("{}", format_comparison(&records));
  Ok(())
}
