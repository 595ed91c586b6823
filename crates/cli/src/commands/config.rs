//! Config commands (show, init)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cloudscrape::config::Config;
use tracing::error;

/// Show the effective configuration as TOML
pub fn cmd_config_show(config: &Config, explicit: Option<&Path>) -> Result<()> {
  match explicit {
    Some(path) => println!("Using config: {}", path.display()),
    None => {
      let user_config = Config::user_config_path();
      if user_config.exists() {
        println!("Using user config: {}", user_config.display());
      } else {
        println!("Using default configuration (no config file found)");
      }
    }
  }
  println!();

  println!("{}", config.to_toml()?);
  Ok(())
}

/// Write a commented config template
pub fn cmd_config_init(explicit: Option<&Path>, force: bool) -> Result<()> {
  let config_path: PathBuf = explicit.map(Path::to_path_buf).unwrap_or_else(Config::user_config_path);

  if config_path.exists() && !force {
    error!("Config file already exists: {}", config_path.display());
    println!("Use --force to overwrite it");
    std::process::exit(1);
  }

  if let Some(parent) = config_path.parent() {
    std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }

  std::fs::write(&config_path, Config::generate_template())
    .with_context(|| format!("Failed to write {}", config_path.display()))?;

  println!("Created config: {}", config_path.display());
  println!("Edit the file to customize settings.");
  Ok(())
}
