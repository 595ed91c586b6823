use anyhow::{Context, Result};
use cloudscrape::config::Config;

use super::open_store;
use crate::format::{format_region_breakdown, format_service_breakdown, format_stats, format_timeline};

/// Show store-wide statistics, or one breakdown when `by` is given
pub async fn cmd_stats(
  config: &Config,
  by: Option<&str>,
  scan_id: Option<&str>,
  days: u32,
  json_output: bool,
) -> Result<()> {
  let db = open_store(config).await?;

  let (json, text) = match by {
    Some("service") => {
      let breakdown = db
        .service_breakdown(scan_id)
        .await
        .context("Failed to compute service breakdown")?;
      (serde_json::to_string_pretty(&breakdown)?, format_service_breakdown(&breakdown))
    }
    Some("region") => {
      let breakdown = db
        .region_breakdown(scan_id)
        .await
        .context("Failed to compute region breakdown")?;
      (serde_json::to_string_pretty(&breakdown)?, format_region_breakdown(&breakdown))
    }
    Some("day") => {
      let timeline = db.timeline(days).await.context("Failed to compute timeline")?;
      (serde_json::to_string_pretty(&timeline)?, format_timeline(&timeline))
    }
    _ => {
      let stats = db.stats().await.context("Failed to compute statistics")?;
      (serde_json::to_string_pretty(&stats)?, format_stats(&stats))
    }
  };

  if json_output {
    println!("{}", json);
  } else {
    print!("{}", text);
  }

  Ok(())
}
