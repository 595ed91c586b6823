//! Plain-text rendering of scans, records, and store statistics.

use chrono::{DateTime, Local, Utc};
use cloudscrape::{
  db::{DailyActivity, RegionBreakdown, ServiceBreakdown, StoreStats},
  record::IngestedRecord,
  scan::ScanSession,
  scrape::{ScanDetails, ScannedFile},
};

// ============================================================================
// Scans
// ============================================================================

/// One line per scan, newest first
pub fn format_scan_list(scans: &[ScanSession]) -> String {
  let mut out = format!(
    "{:<33} {:<19} {:<8} {:>9} {:>10}\n",
    "ID", "STARTED", "OUTCOME", "FILES", "DURATION"
  );
  for scan in scans {
    out.push_str(&format!(
      "{:<33} {:<19} {:<8} {:>9} {:>10}\n",
      scan.id,
      format_timestamp(&scan.started_at),
      scan.outcome.as_str(),
      format!("{}/{}", scan.processed_files, scan.expected_files),
      scan.duration_seconds().map(format_duration).unwrap_or_else(|| "-".into()),
    ));
  }
  out
}

/// Summary printed after a scrape finishes
pub fn format_scan_summary(scan: &ScanSession) -> String {
  let mut out = String::new();
  out.push_str(&format!("Scan:      {}\n", scan.id));
  out.push_str(&format!("Outcome:   {}\n", scan.outcome));
  out.push_str(&format!(
    "Ingested:  {} of {} files\n",
    scan.processed_files, scan.expected_files
  ));
  if let Some(duration) = scan.duration_seconds() {
    out.push_str(&format!("Duration:  {}\n", format_duration(duration)));
  }
  out.push_str(&format!("Output:    {}\n", scan.directory.display()));
  if let Some(error) = &scan.error {
    out.push_str(&format!("Error:     {}\n", error));
  }
  out
}

/// Full view of one scan, its files, and the tail of its logs
pub fn format_scan_details(details: &ScanDetails) -> String {
  let scan = &details.session;
  let mut out = String::from("Scan Details\n============\n\n");

  out.push_str(&format!("ID:          {}\n", scan.id));
  out.push_str(&format!("Outcome:     {}\n", scan.outcome));
  out.push_str(&format!("Started:     {}\n", format_timestamp(&scan.started_at)));
  if let Some(ended) = &scan.ended_at {
    out.push_str(&format!("Ended:       {}\n", format_timestamp(ended)));
  }
  if let Some(duration) = scan.duration_seconds() {
    out.push_str(&format!("Duration:    {}\n", format_duration(duration)));
  }
  out.push_str(&format!("Command:     {}\n", scan.command.join(" ")));
  if let Some(services) = &scan.services {
    out.push_str(&format!("Services:    {}\n", services.join(", ")));
  }
  if let Some(regions) = &scan.regions {
    out.push_str(&format!("Regions:     {}\n", regions.join(", ")));
  }
  if let Some(profile) = &scan.profile {
    out.push_str(&format!("Profile:     {}\n", profile));
  }
  if let Some(code) = scan.return_code {
    out.push_str(&format!("Exit code:   {}\n", code));
  }
  out.push_str(&format!(
    "Ingested:    {} of {} files\n",
    scan.processed_files, scan.expected_files
  ));
  if let Some(error) = &scan.error {
    out.push_str(&format!("Error:       {}\n", error));
  }
  out.push_str(&format!("Directory:   {}\n", scan.directory.display()));

  out.push_str(&format!("\nFiles ({}):\n", details.files.len()));
  for file in &details.files {
    out.push_str(&format_file_line(file));
  }

  for (label, log) in [("stdout", &details.stdout), ("stderr", &details.stderr)] {
    if let Some(log) = log.as_deref().filter(|l| !l.trim().is_empty()) {
      out.push_str(&format!("\n--- {} (last {} lines) ---\n", label, LOG_TAIL_LINES));
      out.push_str(&tail(log, LOG_TAIL_LINES));
      out.push('\n');
    }
  }

  out
}

const LOG_TAIL_LINES: usize = 20;

fn format_file_line(file: &ScannedFile) -> String {
  format!(
    "  {:<60} {:>10}\n",
    truncate(&file.relative_path.to_string_lossy(), 60),
    format_size(file.size)
  )
}

// ============================================================================
// Records
// ============================================================================

/// Table of ingested records (payload omitted)
pub fn format_record_list(records: &[IngestedRecord]) -> String {
  let mut out = format!(
    "{:<12} {:<32} {:<16} {:<14} {:<19}\n",
    "SERVICE", "OPERATION", "REGION", "ACCOUNT", "INGESTED"
  );
  for record in records {
    out.push_str(&format!(
      "{:<12} {:<32} {:<16} {:<14} {:<19}\n",
      truncate(&record.service, 12),
      truncate(&record.operation, 32),
      record.region.as_deref().unwrap_or("-"),
      record.account.as_deref().unwrap_or("-"),
      format_timestamp(&record.ingested_at),
    ));
  }
  out
}

/// One row per scan that recorded the same service/operation/region
pub fn format_comparison(records: &[IngestedRecord]) -> String {
  let mut out = format!("{:<33} {:<14} {:<19} {:>10}\n", "SCAN", "ACCOUNT", "INGESTED", "PAYLOAD");
  for record in records {
    out.push_str(&format!(
      "{:<33} {:<14} {:<19} {:>10}\n",
      record.scan_id,
      record.account.as_deref().unwrap_or("-"),
      format_timestamp(&record.ingested_at),
      format_size(record.payload.to_string().len() as u64),
    ));
  }
  out
}

// ============================================================================
// Stats
// ============================================================================

pub fn format_stats(stats: &StoreStats) -> String {
  let mut out = String::from("Scan Store Statistics\n=====================\n\n");
  out.push_str(&format!("Scans:       {} ({} successful)\n", stats.total_scans, stats.successful_scans));
  out.push_str(&format!("Resources:   {}\n", stats.total_resources));
  out.push_str(&format!(
    "Latest scan: {}\n",
    stats.latest_scan.as_deref().unwrap_or("none")
  ));
  out.push_str(&format!("\nServices ({}): {}\n", stats.services.len(), join_or_none(&stats.services)));
  out.push_str(&format!("Regions ({}):  {}\n", stats.regions.len(), join_or_none(&stats.regions)));
  out
}

pub fn format_service_breakdown(breakdown: &[ServiceBreakdown]) -> String {
  let mut out = format!("{:<16} {:>9} {:>8} {:>11}\n", "SERVICE", "RESOURCES", "REGIONS", "OPERATIONS");
  for entry in breakdown {
    out.push_str(&format!(
      "{:<16} {:>9} {:>8} {:>11}\n",
      truncate(&entry.service, 16),
      entry.resource_count,
      entry.regions.len(),
      entry.operations.len(),
    ));
  }
  out
}

pub fn format_region_breakdown(breakdown: &[RegionBreakdown]) -> String {
  let mut out = format!("{:<16} {:>9} {:>9} {:>11}\n", "REGION", "RESOURCES", "SERVICES", "OPERATIONS");
  for entry in breakdown {
    out.push_str(&format!(
      "{:<16} {:>9} {:>9} {:>11}\n",
      truncate(&entry.region, 16),
      entry.resource_count,
      entry.services.len(),
      entry.operations.len(),
    ));
  }
  out
}

pub fn format_timeline(days: &[DailyActivity]) -> String {
  if days.is_empty() {
    return "No scans in this period\n".to_string();
  }
  let mut out = format!("{:<10} {:>6} {:>10} {:>9}\n", "DATE", "SCANS", "SUCCEEDED", "RESOURCES");
  for day in days {
    out.push_str(&format!(
      "{:<10} {:>6} {:>10} {:>9}\n",
      day.date.format("%Y-%m-%d").to_string(),
      day.total_scans,
      day.successful_scans,
      day.resources,
    ));
  }
  out
}

// ============================================================================
// Helpers
// ============================================================================

fn format_timestamp(at: &DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_duration(seconds: f64) -> String {
  let total = seconds.max(0.0);
  if total < 60.0 {
    format!("{:.1}s", total)
  } else if total < 3600.0 {
    let secs = total as u64;
    format!("{}m {}s", secs / 60, secs % 60)
  } else {
    let secs = total as u64;
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
  }
}

fn format_size(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

fn join_or_none(values: &[String]) -> String {
  if values.is_empty() {
    "none".to_string()
  } else {
    values.join(", ")
  }
}

fn tail(text: &str, lines: usize) -> String {
  let all: Vec<&str> = text.lines().collect();
  all[all.len().saturating_sub(lines)..].join("\n")
}

fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}
