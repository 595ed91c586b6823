//! Scan management commands (list, show, delete, cleanup)

use std::io::Write;

use anyhow::{Context, Result};
use cloudscrape::{config::Config, scrape::Orchestrator};
use tracing::error;

use super::open_store;
use crate::format::{format_scan_details, format_scan_list};

/// List recent scans, newest first
pub async fn cmd_list(config: &Config, limit: usize, success_only: bool, json_output: bool) -> Result<()> {
  let db = open_store(config).await?;
  let scans = db
    .list_scans(success_only, Some(limit), 0)
    .await
    .context("Failed to list scans")?;

  if json_output {
    println!("{}", serde_json::to_string_pretty(&scans)?);
    return Ok(());
  }

  if scans.is_empty() {
    println!("No scans found");
    return Ok(());
  }

  let total = db.count_scans(success_only).await?;
  print!("{}", format_scan_list(&scans));
  if total > scans.len() {
    println!("\nShowing {} of {} scans (use --limit to see more)", scans.len(), total);
  }

  Ok(())
}

/// Show one scan with its files and captured logs
pub async fn cmd_show(config: Config, scan_id: &str, json_output: bool) -> Result<()> {
  let db = open_store(&config).await?;
  let orchestrator = Orchestrator::new(config, db);

  let Some(details) = orchestrator
    .scan_details(scan_id)
    .await
    .context("Failed to load scan details")?
  else {
    error!("Scan not found: {}", scan_id);
    std::process::exit(1);
  };

  if json_output {
    println!("{}", serde_json::to_string_pretty(&details)?);
  } else {
    print!("{}", format_scan_details(&details));
  }

  Ok(())
}

/// Delete a scan's records and files
pub async fn cmd_delete(config: Config, scan_id: &str, force: bool) -> Result<()> {
  if !force {
    print!("Delete scan '{}' and all of its files? [y/N] ", scan_id);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    if !input.trim().eq_ignore_ascii_case("y") {
      println!("Cancelled.");
      return Ok(());
    }
  }

  let db = open_store(&config).await?;
  let orchestrator = Orchestrator::new(config, db);

  if orchestrator.delete_scan(scan_id).await.context("Failed to delete scan")? {
    println!("Deleted scan: {}", scan_id);
  } else {
    error!("Scan not found: {}", scan_id);
    std::process::exit(1);
  }

  Ok(())
}

/// Remove scans older than the retention window
pub async fn cmd_cleanup(config: Config, days: u32) -> Result<()> {
  let db = open_store(&config).await?;
  let orchestrator = Orchestrator::new(config, db);

  let cleaned = orchestrator
    .cleanup_old_scans(days)
    .await
    .context("Failed to clean up old scans")?;

  println!("Removed {} scans older than {} days", cleaned, days);
  Ok(())
}
