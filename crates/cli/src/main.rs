//! cloudscrape CLI - Incremental AWS inventory scraping

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloudscrape::{config::Config, db::ResourceFilter, scrape::ScrapeRequest};
use std::path::PathBuf;

mod commands;
mod format;
mod logging;

use commands::{
  cmd_cleanup, cmd_compare, cmd_config_init, cmd_config_show, cmd_delete, cmd_list, cmd_query, cmd_scrape, cmd_show,
  cmd_stats,
};
use logging::{init_cli_logging, init_scrape_logging};

#[derive(Parser)]
#[command(name = "cloudscrape")]
#[command(about = "Scrape AWS inventory and ingest it while the enumeration tool writes")]
#[command(after_help = "\
QUICK START:
  cloudscrape config init                      # Write a config template
  cloudscrape scrape --service ec2 --region us-east-1
  cloudscrape list                             # Recent scans
  cloudscrape query --scan-id <id> --service ec2

CONFIG LOCATIONS:
  User:     ~/.config/cloudscrape/config.toml
  Explicit: --config <path>")]
struct Cli {
  /// Path to a config file (overrides the user config)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Log scrape progress to the console instead of the log file
  #[arg(long, global = true)]
  foreground: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show the current effective configuration
  Show,

  #[command(long_about = "Write a commented configuration template.\n\n\
    Writes to ~/.config/cloudscrape/config.toml, or to the --config path if given.")]
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Run the enumeration tool and ingest its output
  #[command(after_help = "\
EXAMPLES:
  cloudscrape scrape                                   # Everything the tool supports
  cloudscrape scrape --service s3 --service iam        # Selected services
  cloudscrape scrape --region eu-west-1 --profile prod")]
  Scrape {
    /// Service to enumerate (repeatable)
    #[arg(short, long = "service")]
    services: Vec<String>,
    /// Region to enumerate (repeatable)
    #[arg(short, long = "region")]
    regions: Vec<String>,
    /// Credentials profile passed to the tool
    #[arg(short, long)]
    profile: Option<String>,
    /// Print the final session as JSON
    #[arg(long)]
    json: bool,
  },

  /// List scans, newest first
  List {
    #[arg(short, long, default_value = "20")]
    limit: usize,
    /// Only show successful scans
    #[arg(long)]
    success_only: bool,
    #[arg(long)]
    json: bool,
  },

  /// Show a scan with its files and logs
  Show {
    scan_id: String,
    #[arg(long)]
    json: bool,
  },

  /// Query ingested records
  Query {
    #[arg(long)]
    scan_id: String,
    #[arg(long)]
    service: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    operation: Option<String>,
    #[arg(short, long, default_value = "50")]
    limit: usize,
    #[arg(long)]
    json: bool,
  },

  /// Compare one service/operation/region across scans, newest first
  #[command(after_help = "\
EXAMPLES:
  cloudscrape compare --service ec2 --operation DescribeInstances --region us-east-1
  cloudscrape compare --service s3 --operation ListBuckets     # Global service, no region")]
  Compare {
    #[arg(long)]
    service: String,
    #[arg(long)]
    operation: String,
    /// Omit for records without a region
    #[arg(long)]
    region: Option<String>,
    #[arg(short, long, default_value = "10")]
    limit: usize,
    #[arg(long)]
    json: bool,
  },

  /// Delete a scan's records and files
  Delete {
    scan_id: String,
    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,
  },

  /// Show store statistics
  #[command(after_help = "\
EXAMPLES:
  cloudscrape stats                              # Store-wide totals
  cloudscrape stats --by service --scan-id <id>  # Resources per service in one scan
  cloudscrape stats --by day --days 7            # Scans per day")]
  Stats {
    /// Group resources by service or region, or scans by day
    #[arg(long, value_parser = ["service", "region", "day"])]
    by: Option<String>,
    /// Restrict a service or region breakdown to one scan
    #[arg(long)]
    scan_id: Option<String>,
    /// Days covered by the per-day view
    #[arg(long, default_value = "30")]
    days: u32,
    #[arg(long)]
    json: bool,
  },

  /// Remove scans older than the given number of days
  Cleanup {
    #[arg(long, default_value = "30")]
    days: u32,
  },

  /// Manage configuration
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let explicit = cli.config.as_deref();

  // init must work before any config file exists
  if let Commands::Config {
    command: ConfigCommand::Init { force },
  } = &cli.command
  {
    return cmd_config_init(explicit, *force);
  }

  let config = Config::load(explicit).context("Failed to load configuration")?;

  // File logging only for the long-running scrape, console for everything else
  let _guard = match &cli.command {
    Commands::Scrape { .. } => {
      init_scrape_logging(&config.logging, &cloudscrape::dirs::data_dir().join("logs"), cli.foreground)
    }
    _ => {
      init_cli_logging(&config.logging);
      None
    }
  };

  match cli.command {
    Commands::Scrape {
      services,
      regions,
      profile,
      json,
    } => {
      let request = ScrapeRequest {
        services,
        regions,
        profile,
      };
      cmd_scrape(config, request, json).await
    }
    Commands::List {
      limit,
      success_only,
      json,
    } => cmd_list(&config, limit, success_only, json).await,
    Commands::Show { scan_id, json } => cmd_show(config, &scan_id, json).await,
    Commands::Query {
      scan_id,
      service,
      region,
      operation,
      limit,
      json,
    } => {
      let filter = ResourceFilter {
        scan_id: Some(scan_id),
        service,
        region,
        operation,
      };
      cmd_query(&config, filter, limit, json).await
    }
    Commands::Compare {
      service,
      operation,
      region,
      limit,
      json,
    } => cmd_compare(&config, &service, region.as_deref(), &operation, limit, json).await,
    Commands::Delete { scan_id, force } => cmd_delete(config, &scan_id, force).await,
    Commands::Stats {
      by,
      scan_id,
      days,
      json,
    } => cmd_stats(&config, by.as_deref(), scan_id.as_deref(), days, json).await,
    Commands::Cleanup { days } => cmd_cleanup(config, days).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(&config, cli.config.as_deref()),
      ConfigCommand::Init { force } => cmd_config_init(cli.config.as_deref(), force),
    },
  }
}
