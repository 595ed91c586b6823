//! Run a scrape in the foreground and report the outcome

use anyhow::{Context, Result};
use cloudscrape::{
  config::Config,
  scrape::{Orchestrator, ScrapeRequest},
};
use tracing::warn;

use super::open_store;
use crate::format::format_scan_summary;

/// Run one scan end to end
pub async fn cmd_scrape(config: Config, request: ScrapeRequest, json_output: bool) -> Result<()> {
  let db = open_store(&config).await?;
  let orchestrator = Orchestrator::new(config, db);

  let session = tokio::select! {
    result = orchestrator.scrape(&request) => result.context("Scrape failed")?,
    _ = tokio::signal::ctrl_c() => {
      // dropping the scrape kills the tool; the stored session stays "running"
      warn!("Interrupted, aborting scrape");
      std::process::exit(130);
    }
  };

  if json_output {
    println!("{}", serde_json::to_string_pretty(&session)?);
  } else {
    print!("{}", format_scan_summary(&session));
  }

  if !session.outcome.is_success() {
    std::process::exit(1);
  }

  Ok(())
}
