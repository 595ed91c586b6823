//! CLI command implementations

mod config;
mod query;
mod scans;
mod scrape;
mod stats;

use anyhow::{Context, Result};
use cloudscrape::{config::Config, db::ScanDb};
use std::sync::Arc;

pub use config::{cmd_config_init, cmd_config_show};
pub use query::{cmd_compare, cmd_query};
pub use scans::{cmd_cleanup, cmd_delete, cmd_list, cmd_show};
pub use scrape::cmd_scrape;
pub use stats::cmd_stats;

/// Open the scan store named by the config
async fn open_store(config: &Config) -> Result<Arc<ScanDb>> {
  let db = ScanDb::open(&config.store.path)
    .await
    .with_context(|| format!("Failed to open scan store at {}", config.store.path.display()))?;
  Ok(Arc::new(db))
}
